pub mod export;
pub mod lead_dispatch;
pub mod otp_actor;
