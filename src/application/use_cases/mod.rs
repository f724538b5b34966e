pub mod payment;
pub mod renewal;
pub mod renewal_schedule;
pub mod reporting;
pub mod subscription;
pub mod verification;
