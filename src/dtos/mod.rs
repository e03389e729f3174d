pub mod analyticsdtos;
pub mod campaigndtos;
pub mod customerdtos;
pub mod referraldtos;
pub mod rewarddtos;
pub mod userdtos;

use serde::Serialize;

pub use analyticsdtos::*;
pub use campaigndtos::*;
pub use customerdtos::*;
pub use referraldtos::*;
pub use rewarddtos::*;
pub use userdtos::*;

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// `{status, data}` envelope used by every successful JSON response.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: &'static str,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        ApiResponse {
            status: "success",
            data,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub status: &'static str,
    pub data: Vec<T>,
    pub results: usize,
    pub total: i64,
    pub page: u32,
}

impl<T> ListResponse<T> {
    pub fn new(data: Vec<T>, total: i64, page: u32) -> Self {
        ListResponse {
            status: "success",
            results: data.len(),
            data,
            total,
            page,
        }
    }
}

#[derive(Serialize)]
pub struct Response {
    pub status: &'static str,
    pub message: String,
}
