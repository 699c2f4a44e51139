//! Receipt data model
//!
//! The typed records the structuring provider must produce. Categories are
//! a closed set so downstream reporting can group reliably; anything the
//! model invents on its own collapses to `Miscellaneous`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed spending taxonomy for line items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Food & Dining")]
    FoodAndDining,
    Groceries,
    Transportation,
    Fuel,
    Lodging,
    Travel,
    Utilities,
    Healthcare,
    Pharmacy,
    Clothing,
    Electronics,
    Entertainment,
    #[serde(rename = "Office Supplies")]
    OfficeSupplies,
    #[serde(rename = "Hardware & Tools")]
    HardwareAndTools,
    Services,
    Education,
    Subscriptions,
    Telecom,
    Insurance,
    #[serde(rename = "Taxes & Fees")]
    TaxesAndFees,
    #[serde(rename = "Gifts & Donations")]
    GiftsAndDonations,
    Household,
    Childcare,
    #[serde(rename = "Pet Care")]
    PetCare,
    #[serde(other)]
    Miscellaneous,
}

impl Category {
    /// Every label, in taxonomy order. Used to enumerate the allowed
    /// values inside structuring prompts.
    pub const LABELS: [&'static str; 25] = [
        "Food & Dining",
        "Groceries",
        "Transportation",
        "Fuel",
        "Lodging",
        "Travel",
        "Utilities",
        "Healthcare",
        "Pharmacy",
        "Clothing",
        "Electronics",
        "Entertainment",
        "Office Supplies",
        "Hardware & Tools",
        "Services",
        "Education",
        "Subscriptions",
        "Telecom",
        "Insurance",
        "Taxes & Fees",
        "Gifts & Donations",
        "Household",
        "Childcare",
        "Pet Care",
        "Miscellaneous",
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::FoodAndDining => "Food & Dining",
            Category::Groceries => "Groceries",
            Category::Transportation => "Transportation",
            Category::Fuel => "Fuel",
            Category::Lodging => "Lodging",
            Category::Travel => "Travel",
            Category::Utilities => "Utilities",
            Category::Healthcare => "Healthcare",
            Category::Pharmacy => "Pharmacy",
            Category::Clothing => "Clothing",
            Category::Electronics => "Electronics",
            Category::Entertainment => "Entertainment",
            Category::OfficeSupplies => "Office Supplies",
            Category::HardwareAndTools => "Hardware & Tools",
            Category::Services => "Services",
            Category::Education => "Education",
            Category::Subscriptions => "Subscriptions",
            Category::Telecom => "Telecom",
            Category::Insurance => "Insurance",
            Category::TaxesAndFees => "Taxes & Fees",
            Category::GiftsAndDonations => "Gifts & Donations",
            Category::Household => "Household",
            Category::Childcare => "Childcare",
            Category::PetCare => "Pet Care",
            Category::Miscellaneous => "Miscellaneous",
        }
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::Miscellaneous
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One purchased line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptItem {
    pub name: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    pub price_per_item: f64,
    #[serde(default)]
    pub category: Category,
}

fn default_quantity() -> u32 {
    1
}

/// One structured receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub vendor: String,
    pub date: String,
    pub total: f64,
    #[serde(default)]
    pub items: Vec<ReceiptItem>,
}
