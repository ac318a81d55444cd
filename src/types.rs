use serde::{Deserialize, Serialize};

/// MIME type Google Drive uses for folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Label reported for grants that carry no email address
pub const ANYONE_WITH_LINK: &str = "Anyone with the link";

/// Reference from an item to one of its parent folders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentRef {
    pub id: String,
    #[serde(default)]
    pub is_root: bool,
}

/// Whether an item is a folder or a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Folder,
    File,
}

impl ItemKind {
    /// Classify a MIME type
    pub fn from_mime_type(mime_type: &str) -> Self {
        if mime_type == FOLDER_MIME_TYPE {
            ItemKind::Folder
        } else {
            ItemKind::File
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ItemKind::Folder => "Folder",
            ItemKind::File => "File",
        }
    }
}

/// A file or folder record from the storage listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    #[serde(rename = "title")]
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub parents: Vec<ParentRef>,
    #[serde(default)]
    pub shared: bool,
    /// Bytes of quota used; Drive v2 reports this as a decimal string
    #[serde(default, rename = "quotaBytesUsed", with = "string_u64")]
    pub size: u64,
    #[serde(default)]
    pub icon_link: Option<String>,
    #[serde(default, rename = "alternateLink")]
    pub link: Option<String>,
}

impl Item {
    pub fn kind(&self) -> ItemKind {
        ItemKind::from_mime_type(&self.mime_type)
    }

    /// Id of the parent the path walk follows
    ///
    /// Only the first parent is consulted. `None` means this item sits at the root.
    pub fn parent_id(&self) -> Option<&str> {
        effective_parent(&self.parents)
    }
}

/// The fields of a folder needed to walk up the hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderRecord {
    pub id: String,
    #[serde(rename = "title")]
    pub name: String,
    #[serde(default)]
    pub parents: Vec<ParentRef>,
}

impl FolderRecord {
    pub fn parent_id(&self) -> Option<&str> {
        effective_parent(&self.parents)
    }
}

fn effective_parent(parents: &[ParentRef]) -> Option<&str> {
    match parents.first() {
        Some(parent) if !parent.is_root => Some(parent.id.as_str()),
        _ => None,
    }
}

/// Access level of a permission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Writer,
    Commenter,
    Reader,
    #[serde(other)]
    Other,
}

impl Role {
    /// Roles that show up in the access list of a report
    pub fn is_reported(&self) -> bool {
        matches!(self, Role::Reader | Role::Writer | Role::Commenter)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Writer => "writer",
            Role::Commenter => "commenter",
            Role::Reader => "reader",
            Role::Other => "other",
        }
    }
}

/// A single permission grant on an item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    #[serde(default)]
    pub email_address: Option<String>,
    pub role: Role,
}

/// A grant as it appears in the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessEntry {
    /// Email address, or [`ANYONE_WITH_LINK`] for anonymous grants
    pub label: String,
    pub role: Role,
}

impl AccessEntry {
    /// Convert a permission, dropping roles that are not reported
    pub fn from_permission(permission: &Permission) -> Option<Self> {
        if !permission.role.is_reported() {
            return None;
        }
        let label = match permission.email_address.as_deref() {
            Some(email) if !email.is_empty() => email.to_string(),
            _ => ANYONE_WITH_LINK.to_string(),
        };
        Some(Self {
            label,
            role: permission.role,
        })
    }
}

/// One page of a listing
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPage {
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

impl ItemPage {
    /// Token for the next request, if there is more to fetch
    pub fn continuation(&self) -> Option<&str> {
        self.next_page_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// Presentation-ready record for one shared item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSummary {
    pub id: String,
    pub kind: ItemKind,
    pub icon_link: Option<String>,
    pub path: String,
    pub access: Vec<AccessEntry>,
    pub link: Option<String>,
}

mod string_u64 {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Str(String),
            Num(u64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Num(n) => Ok(n),
            Raw::Str(s) => s.parse().map_err(de::Error::custom),
        }
    }
}
