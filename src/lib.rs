// src/lib.rs

use std::sync::Arc;

use services::{
    campaign_store::CampaignStore,
    catalog::{ProductCatalog, UserDirectory},
    mailer::Mailer,
};

#[derive(Clone)]
pub struct AppState {
    pub campaigns: CampaignStore,
    pub products: ProductCatalog,
    pub users: UserDirectory,
    pub mailer: Arc<dyn Mailer>,
}

pub mod services {
    pub mod campaign_api;
    pub mod campaign_store;
    pub mod campaign_tracker;
    pub mod catalog;
    pub mod import;
    pub mod mailer;
}

pub mod models;
pub mod handlers;
pub mod jobs;
