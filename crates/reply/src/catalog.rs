use std::path::Path;

use chatbox_storage::Message;
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, ensure};

use super::error::{
    CatalogResult, EmptyCardsSnafu, MissingRepliesSnafu, ParseCatalogSnafu, ReadCatalogSnafu,
};

/// Number of canned replies the keyword rules index into.
pub const CANNED_REPLY_COUNT: usize = 5;

pub const DEFAULT_FALLBACK_REPLY: &str = "抱歉，我不太明白你的意思";

const BUILTIN_CATALOG: &str = include_str!("../data/catalog.json");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardLink {
    pub url: String,
    pub label: String,
}

/// Static rich reply block, looked up by id when rendering a card message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub name: String,
    pub description: String,
    pub img: String,
    #[serde(default)]
    pub links: Vec<CardLink>,
}

impl Card {
    /// The first link is attached to the card name.
    pub fn primary_link(&self) -> Option<&CardLink> {
        self.links.first()
    }

    pub fn secondary_links(&self) -> &[CardLink] {
        self.links.get(1..).unwrap_or_default()
    }
}

/// Host-supplied data: the transcript every new session starts with, canned
/// replies, the apology fallback and the card catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyCatalog {
    #[serde(rename = "initialMessages", default)]
    pub initial_messages: Vec<Message>,
    #[serde(rename = "AiReplyList")]
    pub replies: Vec<String>,
    #[serde(default = "default_fallback")]
    pub fallback: String,
    #[serde(rename = "Cards")]
    pub cards: Vec<Card>,
}

impl ReplyCatalog {
    pub fn builtin() -> CatalogResult<Self> {
        Self::from_json(BUILTIN_CATALOG)
    }

    pub fn from_path(path: &Path) -> CatalogResult<Self> {
        let raw = std::fs::read_to_string(path).context(ReadCatalogSnafu {
            stage: "read-catalog-file",
            path: path.to_path_buf(),
        })?;
        let catalog = Self::from_json(&raw)?;
        tracing::info!("loaded reply catalog from {:?}", path);
        Ok(catalog)
    }

    pub fn from_json(raw: &str) -> CatalogResult<Self> {
        let catalog: Self = serde_json::from_str(raw).context(ParseCatalogSnafu {
            stage: "parse-catalog-json",
        })?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn canned_reply(&self, index: usize) -> &str {
        &self.replies[index]
    }

    pub fn find_card(&self, card_id: &str) -> Option<&Card> {
        self.cards.iter().find(|card| card.id == card_id)
    }

    fn validate(&self) -> CatalogResult<()> {
        ensure!(
            self.replies.len() >= CANNED_REPLY_COUNT,
            MissingRepliesSnafu {
                stage: "validate-catalog-replies",
                expected: CANNED_REPLY_COUNT,
                found: self.replies.len(),
            }
        );
        ensure!(
            !self.cards.is_empty(),
            EmptyCardsSnafu {
                stage: "validate-catalog-cards",
            }
        );
        Ok(())
    }
}

fn default_fallback() -> String {
    DEFAULT_FALLBACK_REPLY.to_string()
}
