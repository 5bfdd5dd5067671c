// Полезная нагрузка сообщения: диапазоны body, цитата, контакт, превью ссылки, стикер
//
// Payload-типы не хранят id вложений: единственный владелец ссылок на вложения
// это AttachmentReferenceSet.

use crate::config::Config;
use serde::{Deserialize, Serialize};

/// Стабильный идентификатор вложения в хранилище вложений
pub type AttachmentId = String;

/// Стиль фрагмента текста
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextStyle {
    Bold,
    Italic,
    Spoiler,
    Strikethrough,
    Monospace,
}

/// Что лежит в диапазоне body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BodyRangeKind {
    /// Упоминание: в raw body на этом месте стоит заглушка
    Mention { address: String },
    Style(TextStyle),
}

/// Диапазон в body. Смещения считаются в символах (char), не в байтах.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyRange {
    pub location: usize,
    pub length: usize,
    pub kind: BodyRangeKind,
}

impl BodyRange {
    pub fn mention(location: usize, length: usize, address: impl Into<String>) -> Self {
        Self {
            location,
            length,
            kind: BodyRangeKind::Mention {
                address: address.into(),
            },
        }
    }

    pub fn style(location: usize, length: usize, style: TextStyle) -> Self {
        Self {
            location,
            length,
            kind: BodyRangeKind::Style(style),
        }
    }

    pub fn end(&self) -> usize {
        self.location + self.length
    }
}

/// Форматирование body сообщения
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBodyRanges {
    pub ranges: Vec<BodyRange>,
}

impl MessageBodyRanges {
    pub fn new(ranges: Vec<BodyRange>) -> Self {
        Self { ranges }
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Все диапазоны лежат внутри текста длиной `body_len` символов
    pub fn fits(&self, body_len: usize) -> bool {
        self.ranges.iter().all(|r| r.end() <= body_len)
    }

    /// Упоминания, отсортированные по позиции
    pub fn mentions(&self) -> Vec<(&BodyRange, &str)> {
        let mut mentions: Vec<(&BodyRange, &str)> = self
            .ranges
            .iter()
            .filter_map(|r| match &r.kind {
                BodyRangeKind::Mention { address } => Some((r, address.as_str())),
                BodyRangeKind::Style(_) => None,
            })
            .collect();
        mentions.sort_by_key(|(r, _)| r.location);
        mentions
    }

    /// Подставить имена вместо упоминаний.
    ///
    /// `resolve` отдает отображаемое имя по адресу. Перекрывающиеся упоминания
    /// пропускаются, чтобы не сдвигать уже подставленный текст.
    pub fn plaintext_body<F>(&self, body: &str, resolve: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        let cfg = Config::global();
        let chars: Vec<char> = body.chars().collect();
        let mut out = String::with_capacity(body.len());
        let mut cursor = 0;

        for (range, address) in self.mentions() {
            if range.location < cursor || range.end() > chars.len() {
                continue;
            }
            out.extend(&chars[cursor..range.location]);
            let name = resolve(address).unwrap_or_else(|| cfg.unknown_mention_name.clone());
            out.push_str(&cfg.mention_prefix);
            out.push_str(&name);
            cursor = range.end();
        }
        out.extend(&chars[cursor..]);
        out
    }
}

/// Снимок цитируемого сообщения
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotedMessage {
    /// timestamp оригинального сообщения
    pub timestamp: u64,
    pub author_address: String,
    pub body: Option<String>,
    pub body_ranges: Option<MessageBodyRanges>,
    /// MIME-тип вложения оригинала, если цитата была на медиа
    pub content_type: Option<String>,
    pub source_filename: Option<String>,
}

impl QuotedMessage {
    pub fn new(timestamp: u64, author_address: impl Into<String>, body: Option<String>) -> Self {
        Self {
            timestamp,
            author_address: author_address.into(),
            body,
            body_ranges: None,
            content_type: None,
            source_filename: None,
        }
    }
}

/// Имя в карточке контакта
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactName {
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub organization: Option<String>,
}

impl ContactName {
    pub fn display_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.given_name.as_deref(), self.family_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect();
        if !parts.is_empty() {
            return Some(parts.join(" "));
        }
        self.organization.clone().filter(|s| !s.is_empty())
    }
}

/// Карточка контакта, пересланная в сообщении
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactShare {
    pub name: ContactName,
    pub phone_numbers: Vec<String>,
    pub emails: Vec<String>,
}

/// Превью ссылки
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkPreview {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Unix ms, если сайт сообщил дату публикации
    pub date: Option<u64>,
}

impl LinkPreview {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            description: None,
            date: None,
        }
    }
}

/// Идентификатор стикера внутри пака
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StickerInfo {
    #[serde(with = "serde_bytes")]
    pub pack_id: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub pack_key: Vec<u8>,
    pub sticker_id: u32,
}

impl StickerInfo {
    pub fn pack_id_hex(&self) -> String {
        hex::encode(&self.pack_id)
    }
}

/// Стикер сообщения
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSticker {
    pub info: StickerInfo,
    pub emoji: Option<String>,
}
