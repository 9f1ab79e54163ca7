pub mod catalog;
pub mod forms;
pub mod otp;
pub mod phone;

pub use catalog::Variant;
pub use otp::OtpPurpose;
pub use phone::Phone;
