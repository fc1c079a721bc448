//! Symbolic icon names to renderable icons.
//!
//! Catalog entries only carry a name; UI surfaces resolve it here. Unknown
//! or missing names always resolve to [`DEFAULT_ICON`].

use serde::Serialize;

/// Every icon the catalog may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum IconKey {
    Sparkles,
    PencilSquare,
    TableCells,
    Language,
    PaperAirplane,
    Tag,
    ClipboardDocumentList,
    ChatBubbleLeftRight,
    DocumentDuplicate,
    Trash,
    UserCircle,
    Envelope,
    LightBulb,
    ArrowPath,
    Users,
    Star,
    FaceSmile,
    Phone,
    ListBullet,
    Megaphone,
    RocketLaunch,
    QuestionMarkCircle,
    BugAnt,
    Unknown,
}

/// A resolved icon: its canonical name plus a glyph a text surface can draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Icon {
    pub key: IconKey,
    pub name: &'static str,
    pub glyph: &'static str,
}

pub const DEFAULT_ICON: Icon = Icon {
    key: IconKey::Sparkles,
    name: "SparklesIcon",
    glyph: "✨",
};

const ICONS: &[(IconKey, &str, &str)] = &[
    (IconKey::Sparkles, "SparklesIcon", "✨"),
    (IconKey::PencilSquare, "PencilSquareIcon", "✎"),
    (IconKey::TableCells, "TableCellsIcon", "▦"),
    (IconKey::Language, "LanguageIcon", "文"),
    (IconKey::PaperAirplane, "PaperAirplaneIcon", "➤"),
    (IconKey::Tag, "TagIcon", "⌗"),
    (IconKey::ClipboardDocumentList, "ClipboardDocumentListIcon", "☑"),
    (IconKey::ChatBubbleLeftRight, "ChatBubbleLeftRightIcon", "💬"),
    (IconKey::DocumentDuplicate, "DocumentDuplicateIcon", "⧉"),
    (IconKey::Trash, "TrashIcon", "🗑"),
    (IconKey::UserCircle, "UserCircleIcon", "◉"),
    (IconKey::Envelope, "EnvelopeIcon", "✉"),
    (IconKey::LightBulb, "LightBulbIcon", "💡"),
    (IconKey::ArrowPath, "ArrowPathIcon", "⟳"),
    (IconKey::Users, "UsersIcon", "👥"),
    (IconKey::Star, "StarIcon", "★"),
    (IconKey::FaceSmile, "FaceSmileIcon", "☺"),
    (IconKey::Phone, "PhoneIcon", "☎"),
    (IconKey::ListBullet, "ListBulletIcon", "•"),
    (IconKey::Megaphone, "MegaphoneIcon", "📣"),
    (IconKey::RocketLaunch, "RocketLaunchIcon", "🚀"),
    (IconKey::QuestionMarkCircle, "QuestionMarkCircleIcon", "?"),
    (IconKey::BugAnt, "BugAntIcon", "🐞"),
];

impl IconKey {
    /// Parse a symbolic name. Anything unrecognised is `Unknown`.
    pub fn parse(name: &str) -> IconKey {
        ICONS
            .iter()
            .find(|(_, icon_name, _)| *icon_name == name)
            .map(|(key, _, _)| *key)
            .unwrap_or(IconKey::Unknown)
    }

    pub fn resolve(self) -> Icon {
        ICONS
            .iter()
            .find(|(key, _, _)| *key == self)
            .map(|(key, name, glyph)| Icon {
                key: *key,
                name: *name,
                glyph: *glyph,
            })
            .unwrap_or(DEFAULT_ICON)
    }
}

/// Resolve an optional icon name. Never fails.
pub fn get_action_icon(name: Option<&str>) -> Icon {
    match name {
        Some(name) => IconKey::parse(name).resolve(),
        None => DEFAULT_ICON,
    }
}
