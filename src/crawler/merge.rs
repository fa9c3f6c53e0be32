//! Reconciliation of listings sampled across several passes.

use indexmap::map::Entry;
use indexmap::IndexMap;

use crate::crawler::models::{Listing, ListingKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// First time this key was seen.
    Adopted,
    /// Known key; this many empty fields were filled in.
    Enriched(usize),
    /// Known key; nothing new.
    Unchanged,
}

/// Deduplicated listings in first-adoption order.
///
/// Entries are only ever enriched: the first non-null value of a field wins.
#[derive(Debug, Clone, Default)]
pub struct CanonicalSet {
    entries: IndexMap<ListingKey, Listing>,
}

impl CanonicalSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn absorb(&mut self, listing: Listing) -> MergeOutcome {
        match self.entries.entry(listing.key()) {
            Entry::Vacant(slot) => {
                slot.insert(listing);
                MergeOutcome::Adopted
            }
            Entry::Occupied(mut slot) => match slot.get_mut().fill_missing_from(&listing) {
                0 => MergeOutcome::Unchanged,
                n => MergeOutcome::Enriched(n),
            },
        }
    }

    pub fn absorb_all(&mut self, listings: impl IntoIterator<Item = Listing>) {
        for listing in listings {
            self.absorb(listing);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &ListingKey) -> Option<&Listing> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Listing> {
        self.entries.values()
    }

    pub fn into_listings(self) -> Vec<Listing> {
        self.entries.into_values().collect()
    }
}

/// Fold passes, in order, into one canonical listing sequence.
pub fn merge_passes<I>(passes: I) -> Vec<Listing>
where
    I: IntoIterator<Item = Vec<Listing>>,
{
    let mut set = CanonicalSet::new();
    for pass in passes {
        set.absorb_all(pass);
    }
    set.into_listings()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(title: &str, address: Option<&str>) -> Listing {
        let mut l = Listing::new(title);
        l.address = address.map(str::to_string);
        l
    }

    #[test]
    fn first_non_null_wins() {
        let mut canonical = listing("Cafe A", Some("1 Rue X"));
        canonical.rating = Some(4.5);

        let mut incoming = listing("Cafe A", Some("1 Rue X"));
        incoming.rating = Some(4.0);
        incoming.phone = Some("555-1234".into());

        let mut set = CanonicalSet::new();
        assert_eq!(set.absorb(canonical), MergeOutcome::Adopted);
        assert_eq!(set.absorb(incoming), MergeOutcome::Enriched(1));

        let merged = set.into_listings();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].rating, Some(4.5));
        assert_eq!(merged[0].phone.as_deref(), Some("555-1234"));
    }

    #[test]
    fn absorbing_identical_listing_is_idempotent() {
        let mut cafe = listing("Cafe A", Some("1 Rue X"));
        cafe.rating = Some(4.2);
        cafe.category = Some("Cafe".into());

        let mut set = CanonicalSet::new();
        set.absorb(cafe.clone());
        let before = set.clone().into_listings();

        assert_eq!(set.absorb(cafe.clone()), MergeOutcome::Unchanged);
        assert_eq!(set.into_listings(), before);
    }

    #[test]
    fn dedups_by_key_not_by_content() {
        let mut first = listing("Cafe A", Some("1 Rue X"));
        first.category = Some("Cafe".into());
        let mut second = listing("Cafe A", Some("1 Rue X"));
        second.category = Some("Coffee shop".into());

        let other_branch = listing("Cafe A", Some("9 Quai Y"));

        let merged = merge_passes(vec![vec![first, other_branch], vec![second]]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].address.as_deref(), Some("1 Rue X"));
        assert_eq!(merged[0].category.as_deref(), Some("Cafe"));
        assert_eq!(merged[1].address.as_deref(), Some("9 Quai Y"));
    }

    #[test]
    fn missing_addresses_collide() {
        let mut first = listing("Pharmacy", None);
        first.phone = Some("111".into());
        let mut second = listing("Pharmacy", None);
        second.website = Some("https://pharmacy.example".into());

        let merged = merge_passes(vec![vec![first], vec![second]]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].phone.as_deref(), Some("111"));
        assert_eq!(merged[0].website.as_deref(), Some("https://pharmacy.example"));
    }

    #[test]
    fn keeps_first_adoption_order() {
        let merged = merge_passes(vec![
            vec![listing("B", None), listing("A", None)],
            vec![listing("C", None), listing("B", None)],
        ]);
        let titles: Vec<_> = merged.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, ["B", "A", "C"]);
    }

    #[test]
    fn title_and_key_fields_never_change() {
        let mut set = CanonicalSet::new();
        set.absorb(listing("Cafe A", Some("1 Rue X")));
        set.absorb(listing("Cafe A", Some("1 Rue X")));

        let key = listing("Cafe A", Some("1 Rue X")).key();
        let entry = set.get(&key).unwrap();
        assert_eq!(entry.title, "Cafe A");
        assert_eq!(entry.address.as_deref(), Some("1 Rue X"));
    }
}
