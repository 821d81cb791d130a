pub mod activity;
pub mod chat;
pub mod config;
pub mod finance;
pub mod order;
pub mod sales;
pub mod studio;
pub mod user;
pub mod workflow;

pub use activity::*;
pub use chat::*;
pub use config::*;
pub use finance::*;
pub use order::*;
pub use sales::*;
pub use studio::*;
pub use user::*;
pub use workflow::*;
