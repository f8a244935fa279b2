use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize, Debug)]
pub struct Listing {
    pub data: ListingData,
}

#[derive(Deserialize, Debug)]
pub struct ListingData {
    #[serde(default)]
    pub children: Vec<ListingChild>,
    pub after: Option<String>,
}

/// Children are kept as raw JSON so one bad entry cannot fail the page.
#[derive(Deserialize, Debug)]
pub struct ListingChild {
    pub kind: String,
    pub data: Value,
}

#[derive(Deserialize, Debug)]
pub struct AccessTokenResp {
    pub access_token: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}
