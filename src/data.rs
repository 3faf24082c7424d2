use indexmap::IndexMap;
use serde::Deserialize;

/// Everything the site learns from `menu.json` in one page load.
#[derive(Debug, Deserialize)]
pub struct MenuDocument {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// section name -> items, kept in file order
    pub sections: IndexMap<String, Vec<MenuItem>>,
}

#[derive(Debug, Deserialize)]
pub struct MenuItem {
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub description: Option<String>,
    /// option name -> price delta added on top of `price`
    #[serde(default)]
    pub options: Option<IndexMap<String, f64>>,
}

impl MenuDocument {
    pub fn item_count(&self) -> usize {
        self.sections.values().map(Vec::len).sum()
    }
}

impl MenuItem {
    /// Empty descriptions are treated the same as missing ones.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref().filter(|d| !d.is_empty())
    }
}

#[test]
fn test_sections_keep_file_order() {
    let raw = r#"{
        "sections": {
            "Shakes": [{"name": "Vanilla", "price": 4}],
            "Burgers": [{"name": "Cheese Burger", "price": 8.5}],
            "All Day Breakfast": []
        }
    }"#;
    let menu: MenuDocument = serde_json::from_str(raw).unwrap();
    let names: Vec<_> = menu.sections.keys().map(String::as_str).collect();
    assert_eq!(names, ["Shakes", "Burgers", "All Day Breakfast"]);
    assert_eq!(menu.item_count(), 2);
    assert!(menu.address.is_none());
}

#[test]
fn test_optional_fields() {
    let raw = r#"{
        "address": "1 Main St, Town",
        "phone": null,
        "sections": {
            "Sides": [
                {"name": "Fries", "price": 3.25, "description": "",
                 "options": {"Gravy": 1.5, "Cheese": 1}}
            ]
        }
    }"#;
    let menu: MenuDocument = serde_json::from_str(raw).unwrap();
    assert_eq!(menu.address.as_deref(), Some("1 Main St, Town"));
    assert!(menu.phone.is_none());

    let fries = &menu.sections["Sides"][0];
    assert_eq!(fries.description(), None);
    let options: Vec<_> = fries.options.as_ref().unwrap().keys().cloned().collect();
    assert_eq!(options, ["Gravy", "Cheese"]);
}

#[test]
fn test_shape_violations_fail_to_parse() {
    assert!(serde_json::from_str::<MenuDocument>(r#"{"address": "x"}"#).is_err());
    let bad_price = r#"{"sections": {"A": [{"name": "B", "price": "cheap"}]}}"#;
    assert!(serde_json::from_str::<MenuDocument>(bad_price).is_err());
}
