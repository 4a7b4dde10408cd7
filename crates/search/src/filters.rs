use chemsearch_index::MoleculeRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Record attributes that may be filtered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterAttr {
    User,
    Category,
}

impl FilterAttr {
    pub const fn name(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Category => "category",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "user" => Some(Self::User),
            "category" => Some(Self::Category),
            _ => None,
        }
    }

    pub fn value(self, record: &MoleculeRecord) -> Option<&str> {
        match self {
            Self::User => record.owner(),
            Self::Category => Some(record.category()),
        }
    }
}

/// Ordering applied before filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Assembly order, newest first.
    Newest,
    Oldest,
    Alphabetical,
}

impl SortOrder {
    pub const DEFAULT_KEY: &'static str = "newest";

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "newest" => Some(Self::Newest),
            "oldest" => Some(Self::Oldest),
            "alphabetical" => Some(Self::Alphabetical),
            _ => None,
        }
    }

    pub fn sort(self, mols: &mut [Arc<MoleculeRecord>]) {
        match self {
            Self::Newest => {}
            Self::Oldest => mols.sort_by_key(|record| record.modified()),
            Self::Alphabetical => mols.sort_by(|a, b| a.name().cmp(b.name())),
        }
    }
}

/// Listing parameters as they arrive from a request: sort key, page and
/// any number of `attribute=value` filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filters: BTreeMap<String, String>,
}

impl Criteria {
    /// Split request arguments into sort, page and filters. A page that is
    /// not a number falls back to the first page.
    pub fn from_args<I, K, V>(args: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut criteria = Self::default();
        for (key, value) in args {
            let (key, value) = (key.into(), value.into());
            match key.as_str() {
                "sort" => criteria.sort = Some(value),
                "page" => criteria.page = value.trim().parse().ok(),
                _ => {
                    criteria.filters.insert(key, value);
                }
            }
        }
        criteria
    }

    pub fn sort_key(&self) -> &str {
        self.sort.as_deref().unwrap_or(SortOrder::DEFAULT_KEY)
    }

    pub fn page_number(&self) -> usize {
        self.page.unwrap_or(1)
    }

    pub fn with_filter(mut self, attr: FilterAttr, value: impl Into<String>) -> Self {
        self.filters.insert(attr.name().to_string(), value.into());
        self
    }

    /// Criteria for a facet link: drops the page, then removes `attr=value`
    /// when already active or sets it otherwise.
    pub fn toggle(&self, attr: FilterAttr, value: &str) -> Self {
        let mut next = self.clone();
        next.page = None;
        if self.filters.get(attr.name()).map(String::as_str) == Some(value) {
            next.filters.remove(attr.name());
        } else {
            next.filters.insert(attr.name().to_string(), value.to_string());
        }
        next
    }
}

/// Output of [`FilterSet::apply`].
#[derive(Debug, Clone)]
pub struct Applied {
    pub molecules: Vec<Arc<MoleculeRecord>>,
    /// Filters that were honoured, in allow-list order.
    pub filters: Vec<(FilterAttr, String)>,
    /// Sort key as requested, including unrecognised ones.
    pub sort: String,
}

pub type FacetCounts = BTreeMap<FilterAttr, BTreeMap<String, usize>>;

/// The attributes a deployment allows filtering on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSet {
    allowed: Vec<FilterAttr>,
}

impl FilterSet {
    /// `category` always; `user` only when the archive records ownership.
    pub fn for_archive(ownership: bool) -> Self {
        let allowed = if ownership {
            vec![FilterAttr::User, FilterAttr::Category]
        } else {
            vec![FilterAttr::Category]
        };
        Self { allowed }
    }

    pub fn allowed(&self) -> &[FilterAttr] {
        &self.allowed
    }

    pub fn is_allowed(&self, attr: FilterAttr) -> bool {
        self.allowed.contains(&attr)
    }

    /// Requested filters on allowed attributes; everything else is ignored.
    pub fn active_filters(&self, criteria: &Criteria) -> Vec<(FilterAttr, String)> {
        self.allowed
            .iter()
            .filter_map(|&attr| {
                criteria
                    .filters
                    .get(attr.name())
                    .map(|value| (attr, value.clone()))
            })
            .collect()
    }

    /// Sort, then keep records matching every active filter exactly.
    pub fn apply(&self, mols: &[Arc<MoleculeRecord>], criteria: &Criteria) -> Applied {
        let sort = criteria.sort_key().to_string();
        let mut molecules = mols.to_vec();
        match SortOrder::from_key(&sort) {
            Some(order) => order.sort(&mut molecules),
            None => log::debug!("Ignoring unrecognised sort key '{sort}'"),
        }

        let filters = self.active_filters(criteria);
        molecules.retain(|record| {
            filters
                .iter()
                .all(|(attr, value)| attr.value(record) == Some(value.as_str()))
        });
        Applied {
            molecules,
            filters,
            sort,
        }
    }

    /// Per allowed attribute, how many records carry each value.
    pub fn count_filterable(&self, mols: &[Arc<MoleculeRecord>]) -> FacetCounts {
        self.allowed
            .iter()
            .map(|&attr| {
                let mut counts: BTreeMap<String, usize> = BTreeMap::new();
                for record in mols {
                    if let Some(value) = attr.value(record) {
                        *counts.entry(value.to_string()).or_default() += 1;
                    }
                }
                (attr, counts)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chemsearch_chem::Structure;
    use chemsearch_index::RecordSource;
    use chrono::DateTime;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::path::PathBuf;

    fn record(name: &str, category: &str, owner: Option<&str>, modified: i64) -> Arc<MoleculeRecord> {
        let source = RecordSource {
            path: PathBuf::from(format!("/archive/{category}/{name}.smi")),
            category: category.to_string(),
            owner: owner.map(str::to_string),
            modified: DateTime::from_timestamp(modified, 0).expect("timestamp"),
        };
        Arc::new(MoleculeRecord::from_parse(source, Structure::from_smiles("CCO")))
    }

    fn names(mols: &[Arc<MoleculeRecord>]) -> Vec<&str> {
        mols.iter().map(|record| record.name()).collect()
    }

    fn library() -> Vec<Arc<MoleculeRecord>> {
        vec![
            record("delta", "acids", Some("ana"), 40),
            record("alpha", "bases", Some("ben"), 10),
            record("charlie", "acids", Some("ben"), 30),
            record("bravo", "acids", None, 20),
        ]
    }

    #[test]
    fn sorts_by_requested_key() {
        let set = FilterSet::for_archive(false);
        let mols = library();

        let newest = set.apply(&mols, &Criteria::default());
        assert_eq!(newest.sort, "newest");
        assert_eq!(names(&newest.molecules), vec!["delta", "alpha", "charlie", "bravo"]);

        let oldest = set.apply(&mols, &Criteria::from_args([("sort", "oldest")]));
        assert_eq!(names(&oldest.molecules), vec!["alpha", "bravo", "charlie", "delta"]);

        let alpha = set.apply(&mols, &Criteria::from_args([("sort", "alphabetical")]));
        assert_eq!(names(&alpha.molecules), vec!["alpha", "bravo", "charlie", "delta"]);
    }

    #[test]
    fn unknown_sort_key_is_echoed_and_ignored() {
        let set = FilterSet::for_archive(false);
        let applied = set.apply(&library(), &Criteria::from_args([("sort", "heaviest")]));
        assert_eq!(applied.sort, "heaviest");
        assert_eq!(names(&applied.molecules), vec!["delta", "alpha", "charlie", "bravo"]);
    }

    #[test]
    fn filters_respect_the_allow_list() {
        let args = [("category", "acids"), ("user", "ben"), ("colour", "blue")];
        let criteria = Criteria::from_args(args);

        let local = FilterSet::for_archive(false).apply(&library(), &criteria);
        assert_eq!(local.filters, vec![(FilterAttr::Category, "acids".to_string())]);
        assert_eq!(names(&local.molecules), vec!["delta", "charlie", "bravo"]);

        let shared = FilterSet::for_archive(true).apply(&library(), &criteria);
        assert_eq!(shared.filters.len(), 2);
        assert_eq!(names(&shared.molecules), vec!["charlie"]);
    }

    #[test]
    fn counts_values_ascending_per_attribute() {
        let counts = FilterSet::for_archive(true).count_filterable(&library());
        let attrs: Vec<FilterAttr> = counts.keys().copied().collect();
        assert_eq!(attrs, vec![FilterAttr::User, FilterAttr::Category]);

        let users: Vec<(&str, usize)> = counts[&FilterAttr::User]
            .iter()
            .map(|(value, count)| (value.as_str(), *count))
            .collect();
        assert_eq!(users, vec![("ana", 1), ("ben", 2)]);
        assert_eq!(counts[&FilterAttr::Category]["acids"], 3);
    }

    #[test]
    fn toggle_adds_replaces_and_removes() {
        let base = Criteria::from_args([("page", "3"), ("sort", "oldest")]);

        let added = base.toggle(FilterAttr::Category, "acids");
        assert_eq!(added.page, None);
        assert_eq!(added.sort.as_deref(), Some("oldest"));
        assert_eq!(added.filters.get("category").map(String::as_str), Some("acids"));

        let replaced = added.toggle(FilterAttr::Category, "bases");
        assert_eq!(replaced.filters.get("category").map(String::as_str), Some("bases"));

        let removed = replaced.toggle(FilterAttr::Category, "bases");
        assert!(removed.filters.is_empty());
    }

    #[test]
    fn bad_page_argument_falls_back_to_first_page() {
        assert_eq!(Criteria::from_args([("page", "two")]).page_number(), 1);
        assert_eq!(Criteria::from_args([("page", "2")]).page_number(), 2);
    }

    fn arb_library() -> impl Strategy<Value = Vec<Arc<MoleculeRecord>>> {
        prop::collection::vec(
            (
                prop::sample::select(vec!["acids", "bases", "salts"]),
                prop::option::of(prop::sample::select(vec!["ana", "ben"])),
                0i64..1000,
            ),
            0..24,
        )
        .prop_map(|rows| {
            rows.into_iter()
                .enumerate()
                .map(|(idx, (category, owner, modified))| {
                    record(&format!("m{idx}"), category, owner, modified)
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn proptest_filters_commute(
            mols in arb_library(),
            category in prop::sample::select(vec!["acids", "bases", "salts"]),
            user in prop::sample::select(vec!["ana", "ben"]),
        ) {
            let set = FilterSet::for_archive(true);
            let by_category = Criteria::default().with_filter(FilterAttr::Category, category);
            let by_user = Criteria::default().with_filter(FilterAttr::User, user);

            let category_then_user = set.apply(&set.apply(&mols, &by_category).molecules, &by_user);
            let user_then_category = set.apply(&set.apply(&mols, &by_user).molecules, &by_category);
            prop_assert_eq!(
                names(&category_then_user.molecules),
                names(&user_then_category.molecules)
            );
        }

        #[test]
        fn proptest_oldest_is_sorted_and_stable(mols in arb_library()) {
            let set = FilterSet::for_archive(false);
            let oldest = set.apply(&mols, &Criteria::from_args([("sort", "oldest")])).molecules;
            prop_assert_eq!(oldest.len(), mols.len());
            for pair in oldest.windows(2) {
                prop_assert!(pair[0].modified() <= pair[1].modified());
                if pair[0].modified() == pair[1].modified() {
                    let position = |name: &str| mols.iter().position(|m| m.name() == name);
                    prop_assert!(position(pair[0].name()) < position(pair[1].name()));
                }
            }
        }
    }
}
