//! Resource addresses and the per-store address router.
//!
//! # Responsibility
//! - Parse `<table>` and `<table>/<id>` address strings.
//! - Map resolved targets to the type tags callers dispatch on.
//!
//! # Invariants
//! - An address resolves to exactly one of collection or item; ids are
//!   non-negative and fit in `i64`.
//! - Routes are owned by one router instance; there is no shared global
//!   route table.

use std::fmt::{Display, Formatter};

/// Resolved shape of an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceTarget {
    Collection,
    Item(i64),
}

impl ResourceTarget {
    pub fn resource_type(self) -> ResourceType {
        match self {
            Self::Collection => ResourceType::Collection,
            Self::Item(_) => ResourceType::Item,
        }
    }
}

/// Type tag negotiated by callers before interpreting query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Collection,
    Item,
}

impl ResourceType {
    /// Fixed tag string; part of the external contract.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Collection => "collection-of-records",
            Self::Item => "single-record",
        }
    }

    /// Cursor-style MIME type for records of `record_kind`.
    pub fn mime_type(self, record_kind: &str) -> String {
        match self {
            Self::Collection => format!("vnd.cardstore.dir/{record_kind}"),
            Self::Item => format!("vnd.cardstore.item/{record_kind}"),
        }
    }
}

impl Display for ResourceType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Canonical address of a collection or one of its items.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceAddress {
    table: String,
    target: ResourceTarget,
}

impl ResourceAddress {
    pub fn collection(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            target: ResourceTarget::Collection,
        }
    }

    pub fn item(table: impl Into<String>, id: i64) -> Self {
        Self {
            table: table.into(),
            target: ResourceTarget::Item(id),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn target(&self) -> ResourceTarget {
        self.target
    }

    /// Row id for item addresses.
    pub fn id(&self) -> Option<i64> {
        match self.target {
            ResourceTarget::Item(id) => Some(id),
            ResourceTarget::Collection => None,
        }
    }
}

impl Display for ResourceAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.target {
            ResourceTarget::Collection => write!(f, "{}", self.table),
            ResourceTarget::Item(id) => write!(f, "{}/{id}", self.table),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// Matches one non-negative decimal id.
    Number,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Route {
    segments: Vec<Segment>,
    kind: RouteKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RouteKind {
    Collection,
    Item,
}

/// Matches address strings against the routes registered for one table.
///
/// Patterns are `/`-separated; a `#` segment matches a numeric id.
#[derive(Debug, Clone)]
pub struct AddressRouter {
    table: String,
    routes: Vec<Route>,
}

impl AddressRouter {
    /// Builds the collection (`<table>`) and item (`<table>/#`) routes.
    pub fn for_table(table: impl Into<String>) -> Self {
        let table = table.into();
        let mut router = Self {
            table: table.clone(),
            routes: Vec::with_capacity(2),
        };
        router.add_route(&table, RouteKind::Collection);
        router.add_route(&format!("{table}/#"), RouteKind::Item);
        router
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Resolves `address`, or returns `None` when no route matches.
    pub fn resolve(&self, address: &str) -> Option<ResourceTarget> {
        let parts: Vec<&str> = address.split('/').collect();
        self.routes.iter().find_map(|route| route.matches(&parts))
    }

    fn add_route(&mut self, pattern: &str, kind: RouteKind) {
        let segments = pattern
            .split('/')
            .map(|segment| match segment {
                "#" => Segment::Number,
                literal => Segment::Literal(literal.to_string()),
            })
            .collect();
        self.routes.push(Route { segments, kind });
    }
}

impl Route {
    fn matches(&self, parts: &[&str]) -> Option<ResourceTarget> {
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut id = None;
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Number => id = Some(parse_id(part)?),
            }
        }

        match (self.kind, id) {
            (RouteKind::Collection, None) => Some(ResourceTarget::Collection),
            (RouteKind::Item, Some(id)) => Some(ResourceTarget::Item(id)),
            _ => None,
        }
    }
}

fn parse_id(part: &str) -> Option<i64> {
    if part.is_empty() || !part.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    part.parse::<i64>().ok()
}

#[cfg(test)]
mod tests {
    use super::{AddressRouter, ResourceAddress, ResourceTarget, ResourceType};

    #[test]
    fn resolves_collection_and_item_shapes() {
        let router = AddressRouter::for_table("cards");
        assert_eq!(router.resolve("cards"), Some(ResourceTarget::Collection));
        assert_eq!(router.resolve("cards/0"), Some(ResourceTarget::Item(0)));
        assert_eq!(router.resolve("cards/42"), Some(ResourceTarget::Item(42)));
        assert_eq!(router.resolve("cards/007"), Some(ResourceTarget::Item(7)));
    }

    #[test]
    fn rejects_other_shapes() {
        let router = AddressRouter::for_table("cards");
        for address in [
            "",
            "/",
            "cards/",
            "/cards",
            "cards/-1",
            "cards/+1",
            "cards/1.5",
            "cards/abc",
            "cards/1/2",
            "players",
            "players/1",
            "Cards",
            "cards/99999999999999999999",
        ] {
            assert_eq!(router.resolve(address), None, "address `{address}`");
        }
    }

    #[test]
    fn routers_are_independent() {
        let cards = AddressRouter::for_table("cards");
        let teams = AddressRouter::for_table("teams");
        assert_eq!(cards.resolve("teams"), None);
        assert_eq!(teams.resolve("teams/3"), Some(ResourceTarget::Item(3)));
    }

    #[test]
    fn address_display_is_canonical() {
        assert_eq!(ResourceAddress::collection("cards").to_string(), "cards");
        assert_eq!(ResourceAddress::item("cards", 9).to_string(), "cards/9");
        assert_eq!(ResourceAddress::item("cards", 9).id(), Some(9));
    }

    #[test]
    fn type_tags_are_fixed() {
        assert_eq!(ResourceType::Collection.tag(), "collection-of-records");
        assert_eq!(ResourceType::Item.tag(), "single-record");
        assert_eq!(
            ResourceType::Item.mime_type("baseball_card"),
            "vnd.cardstore.item/baseball_card"
        );
    }
}
