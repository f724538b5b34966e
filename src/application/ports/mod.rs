pub mod commerce_gateway;
pub mod email_sender;
