use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
pub enum Variant {
    #[serde(rename = "DX")]
    #[sqlx(rename = "DX")]
    Dx,
    #[serde(rename = "DX+")]
    #[sqlx(rename = "DX+")]
    DxPlus,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Colour {
    pub slug: &'static str,
    pub name: &'static str,
    pub hex: &'static str,
}

const DX_COLOURS: &[Colour] = &[
    Colour { slug: "midnight-black", name: "Midnight Black", hex: "#111111" },
    Colour { slug: "glacier-white", name: "Glacier White", hex: "#f4f5f7" },
    Colour { slug: "racing-red", name: "Racing Red", hex: "#c4161c" },
];

const DX_PLUS_COLOURS: &[Colour] = &[
    Colour { slug: "midnight-black", name: "Midnight Black", hex: "#111111" },
    Colour { slug: "glacier-white", name: "Glacier White", hex: "#f4f5f7" },
    Colour { slug: "ocean-blue", name: "Ocean Blue", hex: "#1b4f8a" },
    Colour { slug: "sunburst-yellow", name: "Sunburst Yellow", hex: "#f2b705" },
];

impl Variant {
    pub const ALL: [Variant; 2] = [Variant::Dx, Variant::DxPlus];

    pub fn code(self) -> &'static str {
        match self {
            Variant::Dx => "DX",
            Variant::DxPlus => "DX+",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Variant::Dx => "EV Scooter DX",
            Variant::DxPlus => "EV Scooter DX+",
        }
    }

    /// Ex-showroom price in paise.
    pub fn ex_showroom_price(self) -> i64 {
        match self {
            Variant::Dx => 11_499_900,
            Variant::DxPlus => 13_499_900,
        }
    }

    pub fn range_km(self) -> u32 {
        match self {
            Variant::Dx => 110,
            Variant::DxPlus => 150,
        }
    }

    pub fn colours(self) -> &'static [Colour] {
        match self {
            Variant::Dx => DX_COLOURS,
            Variant::DxPlus => DX_PLUS_COLOURS,
        }
    }

    pub fn colour(self, slug: &str) -> Option<&'static Colour> {
        self.colours().iter().find(|c| c.slug == slug)
    }

    pub fn offers(self, slug: &str) -> bool {
        self.colour(slug).is_some()
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Serialize)]
pub struct VariantEntry {
    pub code: Variant,
    pub name: &'static str,
    pub ex_showroom_price: i64,
    pub range_km: u32,
    pub colours: &'static [Colour],
}

pub fn catalog() -> Vec<VariantEntry> {
    Variant::ALL
        .into_iter()
        .map(|v| VariantEntry {
            code: v,
            name: v.display_name(),
            ex_showroom_price: v.ex_showroom_price(),
            range_km: v.range_km(),
            colours: v.colours(),
        })
        .collect()
}
