//! # Hukamnama
//!
//! The daily-selected reading, composed of one or more shabads.
//!
//! - [hukamnama](GurbaniClient::hukamnama) - hukamnama for a date
//! - [hukamnama_today](GurbaniClient::hukamnama_today) - today's hukamnama (local date)

use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{Result, client::GurbaniClient, http_client::HttpRequest, shabad::Shabad};

/// Hukamnama for one day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hukamnama {
    pub date: NaiveDate,
    pub shabads: Vec<Shabad>,
}

impl Hukamnama {
    /// Shabad ids in reading order
    pub fn shabad_ids(&self) -> Vec<u32> {
        self.shabads.iter().map(Shabad::id).collect()
    }
}

/// Request builder for a hukamnama
#[derive(Debug)]
pub struct HukamnamaRequest<'a> {
    client: &'a GurbaniClient,
    date: NaiveDate,
}

impl HukamnamaRequest<'_> {
    /// Fetches the hukamnama. Dates without a recorded hukamnama return `NotFound`.
    pub async fn get(self) -> Result<Hukamnama> {
        let req = HttpRequest::get([
            "hukamnama".to_string(),
            self.date.year().to_string(),
            self.date.month().to_string(),
            self.date.day().to_string(),
        ]);
        self.client.http().get_json(req, "Hukamnama").await
    }
}

impl GurbaniClient {
    /// Returns a request builder for the hukamnama of `date`.
    pub fn hukamnama(&self, date: NaiveDate) -> HukamnamaRequest<'_> {
        HukamnamaRequest { client: self, date }
    }

    /// Returns a request builder for today's hukamnama, using the local date.
    pub fn hukamnama_today(&self) -> HukamnamaRequest<'_> {
        self.hukamnama(Local::now().date_naive())
    }
}
