use serde::{Deserialize, Serialize};

/// A business listing extracted from one detail view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub title: String,
    pub rating: Option<f64>,
    pub review_count: Option<u64>,
    pub category: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
}

/// Identity used to merge listings across passes.
///
/// Exact string match on `(title, address)`; two listings with the same
/// title and no address collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListingKey {
    pub title: String,
    pub address: Option<String>,
}

impl Listing {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            rating: None,
            review_count: None,
            category: None,
            address: None,
            phone: None,
            website: None,
        }
    }

    pub fn key(&self) -> ListingKey {
        ListingKey {
            title: self.title.clone(),
            address: self.address.clone(),
        }
    }

    /// Copy every field of `other` that is still `None` here.
    ///
    /// Existing values are never overwritten. Returns how many fields were filled.
    pub fn fill_missing_from(&mut self, other: &Listing) -> usize {
        fn fill<T: Clone>(slot: &mut Option<T>, incoming: &Option<T>) -> usize {
            match (slot.is_none(), incoming) {
                (true, Some(v)) => {
                    *slot = Some(v.clone());
                    1
                }
                _ => 0,
            }
        }

        fill(&mut self.rating, &other.rating)
            + fill(&mut self.review_count, &other.review_count)
            + fill(&mut self.category, &other.category)
            + fill(&mut self.phone, &other.phone)
            + fill(&mut self.website, &other.website)
    }
}

/// Raw output of the detail parser: every field optional, title included.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailRecord {
    pub title: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<u64>,
    pub category: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
}

impl DetailRecord {
    /// Promote to a [`Listing`]; records without a title are dropped.
    pub fn into_listing(self) -> Option<Listing> {
        Some(Listing {
            title: self.title?,
            rating: self.rating,
            review_count: self.review_count,
            category: self.category,
            address: self.address,
            phone: self.phone,
            website: self.website,
        })
    }
}

/// Listings produced for a query, by one pass or by the merged run.
///
/// `total_results` is always derived from `listings`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ScrapeResultWire")]
pub struct ScrapeResult {
    query: String,
    total_results: usize,
    listings: Vec<Listing>,
}

#[derive(Deserialize)]
struct ScrapeResultWire {
    query: String,
    listings: Vec<Listing>,
}

impl From<ScrapeResultWire> for ScrapeResult {
    fn from(wire: ScrapeResultWire) -> Self {
        ScrapeResult::new(wire.query, wire.listings)
    }
}

impl ScrapeResult {
    pub fn new(query: impl Into<String>, listings: Vec<Listing>) -> Self {
        Self {
            query: query.into(),
            total_results: listings.len(),
            listings,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn total_results(&self) -> usize {
        self.total_results
    }

    pub fn listings(&self) -> &[Listing] {
        &self.listings
    }

    pub fn into_listings(self) -> Vec<Listing> {
        self.listings
    }
}
