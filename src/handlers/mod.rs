pub mod health;
pub mod scenarios;
