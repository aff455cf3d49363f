use serde::{Deserialize, Serialize};

/// Closed set of icons a category may reference by name.
///
/// Categories store the icon as free text; [`IconId::resolve`] maps whatever
/// was stored onto this set and falls back to [`IconId::FALLBACK`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IconId {
    Box,
    Layers,
    Code,
    Palette,
    PenTool,
    Megaphone,
    Search,
    Server,
    Smartphone,
    Globe,
    ShoppingCart,
    Camera,
    Video,
    BarChart,
    Shield,
    Rocket,
}

impl IconId {
    pub const FALLBACK: IconId = IconId::Layers;

    /// Icon given to categories created without one
    pub const DEFAULT: IconId = IconId::Box;

    pub const ALL: [IconId; 16] = [
        IconId::Box,
        IconId::Layers,
        IconId::Code,
        IconId::Palette,
        IconId::PenTool,
        IconId::Megaphone,
        IconId::Search,
        IconId::Server,
        IconId::Smartphone,
        IconId::Globe,
        IconId::ShoppingCart,
        IconId::Camera,
        IconId::Video,
        IconId::BarChart,
        IconId::Shield,
        IconId::Rocket,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            IconId::Box => "Box",
            IconId::Layers => "Layers",
            IconId::Code => "Code",
            IconId::Palette => "Palette",
            IconId::PenTool => "PenTool",
            IconId::Megaphone => "Megaphone",
            IconId::Search => "Search",
            IconId::Server => "Server",
            IconId::Smartphone => "Smartphone",
            IconId::Globe => "Globe",
            IconId::ShoppingCart => "ShoppingCart",
            IconId::Camera => "Camera",
            IconId::Video => "Video",
            IconId::BarChart => "BarChart",
            IconId::Shield => "Shield",
            IconId::Rocket => "Rocket",
        }
    }

    /// Short text glyph used where no icon font is available (quotes, logs)
    pub fn glyph(&self) -> &'static str {
        match self {
            IconId::Box => "[#]",
            IconId::Layers => "[=]",
            IconId::Code => "</>",
            IconId::Palette => "[~]",
            IconId::PenTool => "[/]",
            IconId::Megaphone => "[<]",
            IconId::Search => "[?]",
            IconId::Server => "[S]",
            IconId::Smartphone => "[m]",
            IconId::Globe => "(o)",
            IconId::ShoppingCart => "[$]",
            IconId::Camera => "[c]",
            IconId::Video => "[>]",
            IconId::BarChart => "[|]",
            IconId::Shield => "[+]",
            IconId::Rocket => "[^]",
        }
    }

    pub fn lookup(name: &str) -> Option<IconId> {
        let wanted = normalize(name);
        if wanted.is_empty() {
            return None;
        }
        Self::ALL
            .iter()
            .copied()
            .find(|icon| normalize(icon.name()) == wanted)
    }

    pub fn resolve(name: &str) -> IconId {
        Self::lookup(name).unwrap_or(Self::FALLBACK)
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}
