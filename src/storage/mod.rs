pub mod database;
pub mod migrations;
