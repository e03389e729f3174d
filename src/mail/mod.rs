pub mod mails;
pub mod sendmail;
pub mod sms;
