use std::collections::HashMap;
use std::fs;
use std::path::Path;

use failure::Error;
use failure::Fail;

/// The two shapes of metadata documents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    /// Describes a survey; its identifier is referenced by all child records.
    Parent,
    /// Describes one dataset file of a survey.
    Child,
}

/// A named token in a document template.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Placeholder {
    Uuid,
    ParentUuid,
    Title,
    Date,
    Abstract,
    Keyword1,
    Keyword2,
    Keyword3,
    Keyword4,
    Keyword5,
    North,
    South,
    East,
    West,
    WmsAddress,
    WcsAddress,
    WwwAddress,
    LayerName,
}

impl Placeholder {
    pub const ALL: [Placeholder; 18] = [
        Placeholder::Uuid,
        Placeholder::ParentUuid,
        Placeholder::Title,
        Placeholder::Date,
        Placeholder::Abstract,
        Placeholder::Keyword1,
        Placeholder::Keyword2,
        Placeholder::Keyword3,
        Placeholder::Keyword4,
        Placeholder::Keyword5,
        Placeholder::North,
        Placeholder::South,
        Placeholder::East,
        Placeholder::West,
        Placeholder::WmsAddress,
        Placeholder::WcsAddress,
        Placeholder::WwwAddress,
        Placeholder::LayerName,
    ];

    pub const KEYWORDS: [Placeholder; 5] = [
        Placeholder::Keyword1,
        Placeholder::Keyword2,
        Placeholder::Keyword3,
        Placeholder::Keyword4,
        Placeholder::Keyword5,
    ];

    pub fn token(self) -> &'static str {
        match self {
            Placeholder::Uuid => "{UUID}",
            Placeholder::ParentUuid => "{PARENTUUID}",
            Placeholder::Title => "{TITLE}",
            Placeholder::Date => "{DATE}",
            Placeholder::Abstract => "{ABSTRACT}",
            Placeholder::Keyword1 => "{KEYWORD1}",
            Placeholder::Keyword2 => "{KEYWORD2}",
            Placeholder::Keyword3 => "{KEYWORD3}",
            Placeholder::Keyword4 => "{KEYWORD4}",
            Placeholder::Keyword5 => "{KEYWORD5}",
            Placeholder::North => "{NORTH}",
            Placeholder::South => "{SOUTH}",
            Placeholder::East => "{EAST}",
            Placeholder::West => "{WEST}",
            Placeholder::WmsAddress => "{ONLINEWMSRESOURCE}",
            Placeholder::WcsAddress => "{ONLINEWCSRESOURCE}",
            Placeholder::WwwAddress => "{ONLINEWWWRESOURCE}",
            Placeholder::LayerName => "{LAYERNAME}",
        }
    }
}

const PARENT_PLACEHOLDERS: &[Placeholder] = &[
    Placeholder::ParentUuid,
    Placeholder::Title,
    Placeholder::Date,
    Placeholder::Abstract,
    Placeholder::Keyword1,
    Placeholder::Keyword2,
    Placeholder::Keyword3,
    Placeholder::Keyword4,
    Placeholder::Keyword5,
    Placeholder::North,
    Placeholder::South,
    Placeholder::East,
    Placeholder::West,
];

const CHILD_PLACEHOLDERS: &[Placeholder] = &[
    Placeholder::Uuid,
    Placeholder::ParentUuid,
    Placeholder::Title,
    Placeholder::Date,
    Placeholder::Abstract,
    Placeholder::Keyword1,
    Placeholder::Keyword2,
    Placeholder::Keyword3,
    Placeholder::Keyword4,
    Placeholder::Keyword5,
    Placeholder::North,
    Placeholder::South,
    Placeholder::East,
    Placeholder::West,
    Placeholder::WmsAddress,
    Placeholder::WcsAddress,
    Placeholder::WwwAddress,
    Placeholder::LayerName,
];

impl DocumentKind {
    /// The closed set of placeholders a document of this kind must fill.
    /// A parent's own identifier goes into `{PARENTUUID}`.
    pub fn placeholders(self) -> &'static [Placeholder] {
        match self {
            DocumentKind::Parent => PARENT_PLACEHOLDERS,
            DocumentKind::Child => CHILD_PLACEHOLDERS,
        }
    }

    pub fn accepts(self, placeholder: Placeholder) -> bool {
        self.placeholders().contains(&placeholder)
    }
}

/// Unescaped values for the placeholders of one document.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldMap {
    kind: DocumentKind,
    values: HashMap<Placeholder, String>,
}

impl FieldMap {
    pub fn new(kind: DocumentKind) -> Self {
        Self {
            kind,
            values: HashMap::with_capacity(kind.placeholders().len()),
        }
    }

    pub fn insert(&mut self, placeholder: Placeholder, value: impl Into<String>) {
        self.values.insert(placeholder, value.into());
    }

    pub fn get(&self, placeholder: Placeholder) -> Option<&str> {
        self.values.get(&placeholder).map(String::as_str)
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }
}

/// A document template with `{NAME}` placeholders.
#[derive(Clone, Debug)]
pub struct Template {
    kind: DocumentKind,
    text: String,
}

impl Template {
    /// Create a template, rejecting placeholders that belong to the other document kind.
    pub fn new(kind: DocumentKind, text: String) -> Result<Self, TemplateError> {
        if let Some(foreign) = Placeholder::ALL
            .iter()
            .find(|&&placeholder| !kind.accepts(placeholder) && text.contains(placeholder.token()))
        {
            return Err(TemplateError::ForeignPlaceholder {
                kind,
                token: foreign.token(),
            });
        }

        Ok(Self { kind, text })
    }

    pub fn from_path(kind: DocumentKind, path: &Path) -> Result<Self, Error> {
        let text = fs::read_to_string(path)?;
        Ok(Self::new(kind, text)?)
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// Placeholders of this kind that do not occur in the template text.
    pub fn unused_placeholders(&self) -> Vec<Placeholder> {
        self.kind
            .placeholders()
            .iter()
            .copied()
            .filter(|placeholder| !self.text.contains(placeholder.token()))
            .collect()
    }

    /// Substitute all placeholders with their escaped values in a single pass.
    pub fn render(&self, fields: &FieldMap) -> Result<String, TemplateError> {
        if fields.kind() != self.kind {
            return Err(TemplateError::KindMismatch {
                template: self.kind,
                fields: fields.kind(),
            });
        }

        let mut escaped = HashMap::with_capacity(self.kind.placeholders().len());
        for &placeholder in self.kind.placeholders() {
            let value = fields
                .get(placeholder)
                .ok_or_else(|| TemplateError::MissingField(placeholder.token()))?;
            escaped.insert(placeholder, escape_text(value));
        }

        let mut output = String::with_capacity(self.text.len());
        let mut rest = self.text.as_str();

        while let Some(start) = rest.find('{') {
            output.push_str(&rest[..start]);
            let candidate = &rest[start..];

            match escaped
                .iter()
                .find(|(placeholder, _)| candidate.starts_with(placeholder.token()))
            {
                Some((placeholder, value)) => {
                    output.push_str(value);
                    rest = &candidate[placeholder.token().len()..];
                }
                None => {
                    output.push('{');
                    rest = &candidate[1..];
                }
            }
        }
        output.push_str(rest);

        Ok(output)
    }
}

/// Escape a value for use as XML text or attribute content.
pub fn escape_text(value: &str) -> String {
    String::from_utf8_lossy(&quick_xml::escape::escape(value.as_bytes())).into_owned()
}

#[derive(Debug, Fail)]
pub enum TemplateError {
    /// A required value was not supplied. This is a programming error.
    #[fail(display = "No value for placeholder {}", _0)]
    MissingField(&'static str),
    #[fail(display = "The {:?} template contains the foreign placeholder {}", kind, token)]
    ForeignPlaceholder {
        kind: DocumentKind,
        token: &'static str,
    },
    #[fail(
        display = "Cannot render {:?} fields with a {:?} template",
        fields, template
    )]
    KindMismatch {
        template: DocumentKind,
        fields: DocumentKind,
    },
}
