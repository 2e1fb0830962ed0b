use crate::message::{slice_text, Attachment, ChatMessage, Field};
use serde_json::{Map, Value};

/// Default platform maximum for one serialized message.
pub const DEFAULT_SIZE_LIMIT: usize = 4000;

/// Fixed notice emitted when a unit of content can never fit the size limit.
const OVERFLOW_NOTICE: &str =
    "Too much data: the response exceeded the platform message size limit and was dropped.";

/// Attachment metadata attributes, named so lead/trail partitioning is data
/// rather than per-platform subclasses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentAttr {
    Fallback,
    Pretext,
    AuthorName,
    AuthorLink,
    AuthorIcon,
    Title,
    TitleLink,
    ImageUrl,
    ThumbUrl,
    Color,
    Fields,
    Footer,
    FooterIcon,
    Ts,
}

/// Planner parameters: the size limit plus which attachment attributes render
/// at the top of a block (ride the first fragment) and which at the bottom
/// (ride the last).
#[derive(Debug, Clone)]
pub struct ChunkProfile {
    pub size_limit: usize,
    pub lead: Vec<AttachmentAttr>,
    pub trail: Vec<AttachmentAttr>,
}

impl Default for ChunkProfile {
    fn default() -> Self {
        use AttachmentAttr::*;
        Self {
            size_limit: DEFAULT_SIZE_LIMIT,
            lead: vec![
                Fallback, Pretext, AuthorName, AuthorLink, AuthorIcon, Title, TitleLink, ImageUrl,
                ThumbUrl, Color,
            ],
            trail: vec![Fields, Footer, FooterIcon, Ts],
        }
    }
}

impl ChunkProfile {
    pub fn with_size_limit(size_limit: usize) -> Self {
        Self {
            size_limit,
            ..Self::default()
        }
    }
}

/// Splits an oversized message into an ordered list of fragments that each
/// serialize within the size limit, descending coarse-to-fine: top-level text,
/// then one attachment per message, then an attachment's text, then one field
/// per attachment, then a field's value. Content that can never fit is
/// replaced by a fixed overflow notice rather than sent oversized.
pub struct ChunkPlanner {
    profile: ChunkProfile,
}

impl ChunkPlanner {
    pub fn new(profile: ChunkProfile) -> Self {
        Self { profile }
    }

    pub fn with_size_limit(size_limit: usize) -> Self {
        Self::new(ChunkProfile::with_size_limit(size_limit))
    }

    pub fn size_limit(&self) -> usize {
        self.profile.size_limit
    }

    /// Plan delivery of `message`. A message that already fits is returned
    /// unchanged as a single fragment.
    pub fn plan(&self, message: &ChatMessage) -> Vec<ChatMessage> {
        if self.fits(message) {
            return vec![message.clone()];
        }
        self.split_message(message)
    }

    fn fits(&self, message: &ChatMessage) -> bool {
        message.serialized_size() <= self.profile.size_limit
    }

    /// Text budget left after `fixed` bytes of immovable structure. A fixed
    /// part at or above the limit clamps the budget back to the full limit:
    /// metadata cannot be shrunk here, so slicing proceeds on the limit and
    /// the overflow fallback catches what still cannot fit.
    fn budget_after(&self, fixed: usize) -> usize {
        let budget = self.profile.size_limit.saturating_sub(fixed);
        if budget == 0 {
            self.profile.size_limit
        } else {
            budget
        }
    }

    fn split_message(&self, message: &ChatMessage) -> Vec<ChatMessage> {
        let attachments = message.attachments.clone().unwrap_or_default();

        // Step 1: chunk top-level text first; attachments stay on the final
        // text fragment only if that combined fragment still fits.
        if let Some(text) = message.text.as_deref() {
            if !text.is_empty() {
                return self.split_top_level_text(message, text, attachments);
            }
        }

        // Step 2: platforms render attachments as independent blocks, so
        // emit one attachment per message.
        if attachments.len() > 1 {
            let mut fragments = Vec::new();
            for attachment in attachments {
                let sub = ChatMessage {
                    text: None,
                    attachments: Some(vec![attachment]),
                    extra: message.extra.clone(),
                };
                fragments.extend(self.plan(&sub));
            }
            return fragments;
        }

        // Steps 3-5: a single attachment decomposes by its own axes.
        if let Some(attachment) = attachments.into_iter().next() {
            return self.split_attachment(message, &attachment);
        }

        // No text, no attachments, still oversized: the passthrough envelope
        // alone exceeds the limit.
        vec![self.overflow_fragment(&message.extra)]
    }

    fn split_top_level_text(
        &self,
        message: &ChatMessage,
        text: &str,
        attachments: Vec<Attachment>,
    ) -> Vec<ChatMessage> {
        let shell = ChatMessage {
            text: Some(String::new()),
            attachments: None,
            extra: message.extra.clone(),
        };
        let shell_size = shell.serialized_size();

        // The passthrough envelope alone exceeds the limit: no slicing of the
        // text can ever produce a fitting fragment.
        let mut fragments: Vec<ChatMessage> = if shell_size >= self.profile.size_limit {
            vec![self.overflow_fragment(&message.extra)]
        } else {
            slice_text(text, self.budget_after(shell_size))
                .into_iter()
                .map(|slice| ChatMessage {
                    text: Some(slice),
                    attachments: None,
                    extra: message.extra.clone(),
                })
                .collect()
        };

        if attachments.is_empty() {
            return fragments;
        }

        if let Some(last) = fragments.pop() {
            let combined = ChatMessage {
                attachments: Some(attachments.clone()),
                ..last.clone()
            };
            if self.fits(&combined) {
                fragments.push(combined);
            } else {
                fragments.push(last);
                fragments.extend(self.plan(&ChatMessage {
                    text: None,
                    attachments: Some(attachments),
                    extra: message.extra.clone(),
                }));
            }
        }
        fragments
    }

    /// Step 3: slice a single attachment's text. The first fragment keeps the
    /// lead attributes, the last keeps the trail attributes, middles carry
    /// only their slice. Top-level text rides the first fragment only.
    fn split_attachment(&self, message: &ChatMessage, attachment: &Attachment) -> Vec<ChatMessage> {
        let text = attachment.text.clone().unwrap_or_default();

        let stripped = Attachment {
            text: Some(String::new()),
            ..attachment.clone()
        };
        let shell = ChatMessage {
            text: message.text.clone(),
            attachments: Some(vec![stripped]),
            extra: message.extra.clone(),
        };
        let budget = self.budget_after(shell.serialized_size());

        let mut slices = slice_text(&text, budget);
        let multi_slice = slices.len() > 1;
        let last_slice = if multi_slice { slices.pop() } else { None };

        let mut lead = self.project(attachment, &self.profile.lead);
        lead.extra = attachment.extra.clone();
        let mut trail = self.project(attachment, &self.profile.trail);

        let mut pending = Vec::new();

        let mut slices = slices.into_iter();
        if let Some(first_slice) = slices.next() {
            lead.text = non_empty(first_slice);
            if message.text.is_some() || !lead.is_empty() {
                pending.push(ChatMessage {
                    text: message.text.clone(),
                    attachments: Some(vec![lead]),
                    extra: message.extra.clone(),
                });
            }
        }
        for slice in slices {
            pending.push(ChatMessage {
                text: None,
                attachments: Some(vec![Attachment {
                    text: Some(slice),
                    ..Attachment::default()
                }]),
                extra: message.extra.clone(),
            });
        }

        trail.text = last_slice.and_then(non_empty);
        if !trail.is_empty() {
            pending.push(ChatMessage {
                text: None,
                attachments: Some(vec![trail]),
                extra: message.extra.clone(),
            });
        }

        let mut fragments = Vec::new();
        for fragment in pending {
            if self.fits(&fragment) {
                fragments.push(fragment);
            } else {
                fragments.extend(self.split_overflow_fragment(fragment));
            }
        }
        fragments
    }

    /// A fragment built under a clamped budget may still be oversized; pick
    /// the next finer axis or give up on the unit.
    fn split_overflow_fragment(&self, fragment: ChatMessage) -> Vec<ChatMessage> {
        let Some(attachment) = fragment
            .attachments
            .as_ref()
            .and_then(|a| a.first())
            .cloned()
        else {
            return vec![self.overflow_fragment(&fragment.extra)];
        };

        let field_count = attachment.fields.as_deref().map_or(0, <[Field]>::len);
        if field_count > 1 {
            return self.split_fields(&fragment, &attachment);
        }
        if field_count == 1 {
            return self.split_field_value(&fragment, &attachment);
        }

        // Text-bearing fragment: re-slice against its own (smaller) metadata,
        // but only when that metadata actually leaves room; otherwise the
        // unit can never fit and recursion would not terminate.
        let has_text = attachment.text.as_deref().is_some_and(|t| !t.is_empty());
        if has_text {
            let meta_only = ChatMessage {
                attachments: Some(vec![Attachment {
                    text: Some(String::new()),
                    ..attachment.clone()
                }]),
                ..fragment.clone()
            };
            if meta_only.serialized_size() < self.profile.size_limit {
                return self.split_attachment(&fragment, &attachment);
            }
        }

        tracing::warn!(
            "dropping content: a single unit exceeds the {} byte limit even without its payload",
            self.profile.size_limit
        );
        vec![self.overflow_fragment(&fragment.extra)]
    }

    /// Step 4: one field per emitted attachment. Whatever renders above the
    /// fields (text slice, leftover lead attributes) leads off; footer and
    /// timestamp ride the last field's fragment.
    fn split_fields(&self, fragment: &ChatMessage, attachment: &Attachment) -> Vec<ChatMessage> {
        let fields = attachment.fields.clone().unwrap_or_default();
        let mut fragments = Vec::new();

        let head = Attachment {
            fields: None,
            footer: None,
            footer_icon: None,
            ts: None,
            ..attachment.clone()
        };
        if !head.is_empty() {
            fragments.extend(self.plan(&ChatMessage {
                text: fragment.text.clone(),
                attachments: Some(vec![head]),
                extra: fragment.extra.clone(),
            }));
        }

        let last = fields.len() - 1;
        for (i, field) in fields.into_iter().enumerate() {
            let one = Attachment {
                fields: Some(vec![field]),
                footer: if i == last {
                    attachment.footer.clone()
                } else {
                    None
                },
                footer_icon: if i == last {
                    attachment.footer_icon.clone()
                } else {
                    None
                },
                ts: if i == last { attachment.ts } else { None },
                ..Attachment::default()
            };
            let sub = ChatMessage {
                text: None,
                attachments: Some(vec![one.clone()]),
                extra: fragment.extra.clone(),
            };
            if self.fits(&sub) {
                fragments.push(sub);
            } else {
                fragments.extend(self.split_field_value(&sub, &one));
            }
        }
        fragments
    }

    /// Step 5: slice one field's value. Each piece becomes its own one-field
    /// attachment; the field title rides the first piece, the parent's footer
    /// and timestamp ride the last. Step 6: when the fixed part around the
    /// value already exceeds the limit, the unit is abandoned for the fixed
    /// overflow notice instead of a corrupted partial field.
    fn split_field_value(&self, fragment: &ChatMessage, attachment: &Attachment) -> Vec<ChatMessage> {
        let Some(field) = attachment.fields.as_ref().and_then(|f| f.first()).cloned() else {
            return vec![self.overflow_fragment(&fragment.extra)];
        };

        let stripped = Attachment {
            fields: Some(vec![Field {
                value: String::new(),
                ..field.clone()
            }]),
            ..attachment.clone()
        };
        let stripped_size = ChatMessage {
            attachments: Some(vec![stripped]),
            ..fragment.clone()
        }
        .serialized_size();

        if stripped_size > self.profile.size_limit {
            tracing::warn!(
                "dropping field {:?}: fixed metadata alone exceeds the {} byte limit",
                field.title,
                self.profile.size_limit
            );
            return vec![self.overflow_fragment(&fragment.extra)];
        }

        let budget = self.budget_after(stripped_size);
        let slices = slice_text(&field.value, budget);
        let last = slices.len() - 1;

        let mut fragments = Vec::new();
        for (i, slice) in slices.into_iter().enumerate() {
            let piece = Field {
                title: if i == 0 { field.title.clone() } else { None },
                value: slice,
                short: if i == 0 { field.short } else { None },
            };
            // Anything else riding this attachment renders above the field,
            // so it goes out with the first piece.
            let base = if i == 0 {
                Attachment {
                    fields: None,
                    footer: None,
                    footer_icon: None,
                    ts: None,
                    ..attachment.clone()
                }
            } else {
                Attachment::default()
            };
            let att = Attachment {
                fields: Some(vec![piece]),
                footer: if i == last {
                    attachment.footer.clone()
                } else {
                    None
                },
                footer_icon: if i == last {
                    attachment.footer_icon.clone()
                } else {
                    None
                },
                ts: if i == last { attachment.ts } else { None },
                ..base
            };
            let sub = ChatMessage {
                text: None,
                attachments: Some(vec![att]),
                extra: fragment.extra.clone(),
            };
            if self.fits(&sub) {
                fragments.push(sub);
            } else {
                fragments.push(self.overflow_fragment(&fragment.extra));
            }
        }
        fragments
    }

    /// Step 6 fallback: a fixed notice plus the passthrough identity
    /// attributes, deliberately discarding the oversized payload.
    fn overflow_fragment(&self, extra: &Map<String, Value>) -> ChatMessage {
        ChatMessage {
            text: Some(OVERFLOW_NOTICE.to_string()),
            attachments: None,
            extra: extra.clone(),
        }
    }

    fn project(&self, attachment: &Attachment, attrs: &[AttachmentAttr]) -> Attachment {
        let mut out = Attachment::default();
        for attr in attrs {
            match attr {
                AttachmentAttr::Fallback => out.fallback = attachment.fallback.clone(),
                AttachmentAttr::Pretext => out.pretext = attachment.pretext.clone(),
                AttachmentAttr::AuthorName => out.author_name = attachment.author_name.clone(),
                AttachmentAttr::AuthorLink => out.author_link = attachment.author_link.clone(),
                AttachmentAttr::AuthorIcon => out.author_icon = attachment.author_icon.clone(),
                AttachmentAttr::Title => out.title = attachment.title.clone(),
                AttachmentAttr::TitleLink => out.title_link = attachment.title_link.clone(),
                AttachmentAttr::ImageUrl => out.image_url = attachment.image_url.clone(),
                AttachmentAttr::ThumbUrl => out.thumb_url = attachment.thumb_url.clone(),
                AttachmentAttr::Color => out.color = attachment.color.clone(),
                AttachmentAttr::Fields => out.fields = attachment.fields.clone(),
                AttachmentAttr::Footer => out.footer = attachment.footer.clone(),
                AttachmentAttr::FooterIcon => out.footer_icon = attachment.footer_icon.clone(),
                AttachmentAttr::Ts => out.ts = attachment.ts,
            }
        }
        out
    }
}

impl Default for ChunkPlanner {
    fn default() -> Self {
        Self::new(ChunkProfile::default())
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}
