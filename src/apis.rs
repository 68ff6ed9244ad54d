pub mod opportunity_api;
