use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SellerInfo {
    pub seller_name: String,
    pub seller_image: String,
    pub seller_rating: String,
    pub review_count: u64,
    pub seller_location: String,
    pub upload_frequency: String,
}

/// One scraped listing, as persisted in the JSON collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: String,
    pub url: String,
    pub title: String,
    pub price: f64,
    pub description: String,
    pub seller_info: SellerInfo,
    pub likes: u64,
    pub views: u64,
    pub brand: String,
    pub size: String,
    pub condition: String,
    pub location: String,
    pub shipping_cost: f64,
    pub buyer_protection: String,
    pub image_urls: Vec<String>,
    image_paths: Vec<String>,
    image_count: usize,
    pub scraped_at: DateTime<Local>,
}

impl ProductRecord {
    /// An all-default record for `url` with a fresh id.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            url: url.into(),
            title: String::new(),
            price: 0.0,
            description: String::new(),
            seller_info: SellerInfo::default(),
            likes: 0,
            views: 0,
            brand: String::new(),
            size: String::new(),
            condition: String::new(),
            location: String::new(),
            shipping_cost: 0.0,
            buyer_protection: String::new(),
            image_urls: Vec::new(),
            image_paths: Vec::new(),
            image_count: 0,
            scraped_at: Local::now(),
        }
    }

    pub fn image_paths(&self) -> &[String] {
        &self.image_paths
    }

    pub fn image_count(&self) -> usize {
        self.image_count
    }

    /// Records the storage keys of the images that were saved.
    pub fn set_image_paths(&mut self, paths: Vec<String>) {
        self.image_count = paths.len();
        self.image_paths = paths;
    }
}
