pub mod address;
pub mod cadence;
pub mod payment_record;
pub mod payment_status;
pub mod renewal_window;
pub mod subscription_status;
