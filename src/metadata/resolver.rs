use failure::Error;
use regex::Regex;
use uuid::Uuid;

use crate::dataset::{DatasetAttributes, GeoBounds};
use crate::metadata::{DocumentKind, FieldMap, Placeholder};
use crate::overrides::{DatasetOverride, SurveyOverride};
use crate::settings::ServiceSettings;

pub const KEYWORD_SLOTS: usize = 5;
pub const UNKNOWN_DATE: &str = "unknown";

/// Runs of word characters and apostrophes.
const KEYWORD_PATTERN: &str = r"[\w']+";

/// Where the published grid can be reached. Child records only.
#[derive(Clone, Debug, PartialEq)]
pub struct ServiceAddresses {
    pub wms: String,
    pub wcs: String,
    pub www: String,
    pub layer_name: String,
}

/// The winning value of every metadata field of one record, unescaped.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedFields {
    pub title: String,
    pub date: String,
    pub abstract_text: String,
    pub keywords: [String; KEYWORD_SLOTS],
    pub bounds: GeoBounds,
    pub addresses: Option<ServiceAddresses>,
}

impl ResolvedFields {
    /// Values for a parent document identified by `identifier`.
    pub fn to_parent_fields(&self, identifier: &Uuid) -> FieldMap {
        let mut fields = FieldMap::new(DocumentKind::Parent);
        fields.insert(Placeholder::ParentUuid, identifier.to_string());
        self.insert_common(&mut fields);
        fields
    }

    /// Values for a child document linked to the parent `parent_identifier`.
    pub fn to_child_fields(&self, identifier: &Uuid, parent_identifier: &Uuid) -> FieldMap {
        let mut fields = FieldMap::new(DocumentKind::Child);
        fields.insert(Placeholder::Uuid, identifier.to_string());
        fields.insert(Placeholder::ParentUuid, parent_identifier.to_string());
        self.insert_common(&mut fields);

        if let Some(addresses) = &self.addresses {
            fields.insert(Placeholder::WmsAddress, addresses.wms.as_str());
            fields.insert(Placeholder::WcsAddress, addresses.wcs.as_str());
            fields.insert(Placeholder::WwwAddress, addresses.www.as_str());
            fields.insert(Placeholder::LayerName, addresses.layer_name.as_str());
        }

        fields
    }

    fn insert_common(&self, fields: &mut FieldMap) {
        fields.insert(Placeholder::Title, self.title.as_str());
        fields.insert(Placeholder::Date, self.date.as_str());
        fields.insert(Placeholder::Abstract, self.abstract_text.as_str());
        for (placeholder, keyword) in Placeholder::KEYWORDS.iter().zip(&self.keywords) {
            fields.insert(*placeholder, keyword.as_str());
        }
        fields.insert(Placeholder::North, self.bounds.north.as_str());
        fields.insert(Placeholder::South, self.bounds.south.as_str());
        fields.insert(Placeholder::East, self.bounds.east.as_str());
        fields.insert(Placeholder::West, self.bounds.west.as_str());
    }
}

/// Decides the value of each metadata field from the raw attributes and the
/// override rows, in a fixed source priority per field.
#[derive(Debug)]
pub struct FieldResolver {
    wms_url: String,
    wcs_url: String,
    grid_extension: String,
    keyword_pattern: Regex,
}

impl FieldResolver {
    pub fn new(service_settings: &ServiceSettings, grid_extension: &str) -> Result<Self, Error> {
        Ok(Self {
            wms_url: service_settings.wms_url.clone(),
            wcs_url: service_settings.wcs_url.clone(),
            grid_extension: grid_extension.into(),
            keyword_pattern: Regex::new(KEYWORD_PATTERN)?,
        })
    }

    pub fn resolve(
        &self,
        attributes: &DatasetAttributes,
        survey: Option<&SurveyOverride>,
        dataset: Option<&DatasetOverride>,
        kind: DocumentKind,
    ) -> ResolvedFields {
        ResolvedFields {
            title: Self::resolve_title(attributes, survey, dataset, kind),
            date: Self::resolve_date(attributes, survey, dataset),
            abstract_text: Self::resolve_abstract(attributes, survey),
            keywords: self.resolve_keywords(attributes, survey, dataset),
            bounds: match kind {
                DocumentKind::Parent => Self::resolve_parent_bounds(attributes, survey),
                DocumentKind::Child => Self::raw_bounds(attributes),
            },
            addresses: match kind {
                DocumentKind::Parent => None,
                DocumentKind::Child => Some(self.resolve_addresses(attributes, dataset)),
            },
        }
    }

    fn resolve_title(
        attributes: &DatasetAttributes,
        survey: Option<&SurveyOverride>,
        dataset: Option<&DatasetOverride>,
        kind: DocumentKind,
    ) -> String {
        let raw_title = || attributes.non_blank("title").map(|title| title.trim().to_string());
        let raw_label = || attributes.non_blank("label").map(underscores_to_spaces);

        survey
            .and_then(|survey| non_blank(&survey.title))
            .map(String::from)
            .or_else(|| {
                dataset
                    .and_then(|dataset| non_blank(&dataset.label))
                    .map(underscores_to_spaces)
            })
            .or_else(|| match kind {
                DocumentKind::Parent => raw_title().or_else(raw_label),
                DocumentKind::Child => raw_label().or_else(raw_title),
            })
            .unwrap_or_else(|| attributes.stem().to_string())
    }

    fn resolve_date(
        attributes: &DatasetAttributes,
        survey: Option<&SurveyOverride>,
        dataset: Option<&DatasetOverride>,
    ) -> String {
        survey
            .and_then(|survey| non_blank(&survey.beginning_time))
            .map(String::from)
            .or_else(|| attributes.get("date").and_then(truncate_date))
            .or_else(|| dataset.and_then(|dataset| truncate_date(&dataset.date)))
            .unwrap_or_else(|| UNKNOWN_DATE.into())
    }

    /// Without a survey abstract the whole attribute map is rendered. That is a
    /// stand-in rather than a real abstract, but catalogues rely on it being filled.
    fn resolve_abstract(attributes: &DatasetAttributes, survey: Option<&SurveyOverride>) -> String {
        survey
            .and_then(|survey| non_blank(&survey.abstract_text))
            .map(String::from)
            .unwrap_or_else(|| {
                serde_json::to_string(attributes.values())
                    .unwrap_or_else(|_| format!("{:?}", attributes.values()))
            })
    }

    fn resolve_keywords(
        &self,
        attributes: &DatasetAttributes,
        survey: Option<&SurveyOverride>,
        dataset: Option<&DatasetOverride>,
    ) -> [String; KEYWORD_SLOTS] {
        let keywords: Vec<String> = survey
            .map(|survey| {
                self.word_tokens(&survey.survey_type)
                    .chain(self.word_tokens(&survey.data_type))
                    .collect::<Vec<_>>()
            })
            .filter(|keywords| !keywords.is_empty())
            .or_else(|| {
                dataset
                    .map(|dataset| {
                        [&dataset.theme, &dataset.data_type]
                            .iter()
                            .filter_map(|value| non_blank(value))
                            .map(String::from)
                            .collect::<Vec<_>>()
                    })
                    .filter(|keywords| !keywords.is_empty())
            })
            .or_else(|| {
                attributes
                    .non_blank("theme")
                    .map(|theme| vec![theme.trim().to_string()])
            })
            .unwrap_or_default();

        std::array::from_fn(|slot| keywords.get(slot).cloned().unwrap_or_default())
    }

    fn word_tokens<'t>(&'t self, text: &'t str) -> impl Iterator<Item = String> + 't {
        self.keyword_pattern
            .find_iter(text)
            .map(|token| token.as_str().to_string())
    }

    fn resolve_parent_bounds(
        attributes: &DatasetAttributes,
        survey: Option<&SurveyOverride>,
    ) -> GeoBounds {
        let whole_earth = GeoBounds::whole_earth();

        GeoBounds {
            north: resolve_bound(
                survey.map(|survey| survey.north_bound_latitude.as_str()),
                attributes.get("north"),
                whole_earth.north,
            ),
            south: resolve_bound(
                survey.map(|survey| survey.south_bound_latitude.as_str()),
                attributes.get("south"),
                whole_earth.south,
            ),
            east: resolve_bound(
                survey.map(|survey| survey.east_bound_longitude.as_str()),
                attributes.get("east"),
                whole_earth.east,
            ),
            west: resolve_bound(
                survey.map(|survey| survey.west_bound_longitude.as_str()),
                attributes.get("west"),
                whole_earth.west,
            ),
        }
    }

    /// Child records take the grid bounds as they are. Only a dataset that was
    /// never augmented with bounds falls back to the whole earth.
    fn raw_bounds(attributes: &DatasetAttributes) -> GeoBounds {
        let whole_earth = GeoBounds::whole_earth();
        let raw = |key: &str, default: String| {
            attributes
                .non_blank(key)
                .map(|value| value.trim().to_string())
                .unwrap_or(default)
        };

        GeoBounds {
            north: raw("north", whole_earth.north),
            south: raw("south", whole_earth.south),
            east: raw("east", whole_earth.east),
            west: raw("west", whole_earth.west),
        }
    }

    fn resolve_addresses(
        &self,
        attributes: &DatasetAttributes,
        dataset: Option<&DatasetOverride>,
    ) -> ServiceAddresses {
        let stem = attributes.stem();

        ServiceAddresses {
            wms: format!("{}{}.{}", self.wms_url, stem, self.grid_extension),
            wcs: format!("{}{}.{}", self.wcs_url, stem, self.grid_extension),
            www: dataset
                .and_then(|dataset| non_blank(&dataset.url))
                .map(|url| format!("{}.html", url))
                .unwrap_or_default(),
            layer_name: stem.to_string(),
        }
    }
}

/// The trimmed value, unless it is blank.
fn non_blank(value: &str) -> Option<&str> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn underscores_to_spaces(value: &str) -> String {
    value.trim().replace('_', " ")
}

/// Dates carry version suffixes after the first underscore.
fn truncate_date(value: &str) -> Option<String> {
    value.split('_').next().and_then(non_blank).map(String::from)
}

fn is_number(value: &str) -> bool {
    value
        .trim()
        .parse::<f64>()
        .map(f64::is_finite)
        .unwrap_or(false)
}

fn resolve_bound(survey_value: Option<&str>, raw_value: Option<&str>, default: String) -> String {
    survey_value
        .filter(|value| is_number(value))
        .or_else(|| raw_value.filter(|value| is_number(value)))
        .map(|value| value.trim().to_string())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> FieldResolver {
        FieldResolver::new(
            &ServiceSettings {
                wms_url: "http://maps/wms/".into(),
                wcs_url: "http://maps/wcs/".into(),
            },
            "nc4",
        )
        .unwrap()
    }

    fn bounds(north: &str) -> GeoBounds {
        GeoBounds {
            north: north.into(),
            south: "-30.25".into(),
            east: "150.5".into(),
            west: "140".into(),
        }
    }

    fn attributes(text: &str) -> DatasetAttributes {
        DatasetAttributes::from_text("grid_demg.isi", "grid_demg", text).with_bounds(&bounds("-23.5"))
    }

    fn survey() -> SurveyOverride {
        SurveyOverride {
            survey_id: "1234".into(),
            title: "Survey Title".into(),
            beginning_time: "1999-05-01".into(),
            abstract_text: "Survey abstract".into(),
            survey_type: "Airborne, Ground-based".into(),
            data_type: "Magnetic's data; radiometric".into(),
            north_bound_latitude: "N/A".into(),
            south_bound_latitude: "-35".into(),
            east_bound_longitude: "".into(),
            west_bound_longitude: "unknown".into(),
        }
    }

    fn dataset() -> DatasetOverride {
        DatasetOverride {
            filename: "grid_demg.isi".into(),
            label: "Digital_Elevation_Model".into(),
            date: "2004_02".into(),
            theme: "Elevation".into(),
            data_type: "Grid".into(),
            url: "http://portal/grid".into(),
            survey_id: "1234".into(),
        }
    }

    #[test]
    fn survey_override_wins_for_parents() {
        let fields = resolver().resolve(
            &attributes("title = Raw\ndate = 2001_x\ntheme = Raw theme"),
            Some(&survey()),
            Some(&dataset()),
            DocumentKind::Parent,
        );

        assert_eq!(fields.title, "Survey Title");
        assert_eq!(fields.date, "1999-05-01");
        assert_eq!(fields.abstract_text, "Survey abstract");
        assert_eq!(
            fields.keywords,
            ["Airborne", "Ground", "based", "Magnetic's", "data"].map(String::from)
        );
        assert!(fields.addresses.is_none());
    }

    #[test]
    fn dataset_label_replaces_underscores() {
        let fields = resolver().resolve(
            &attributes("title = Raw"),
            None,
            Some(&dataset()),
            DocumentKind::Child,
        );

        assert_eq!(fields.title, "Digital Elevation Model");
    }

    #[test]
    fn raw_title_preference_depends_on_kind() {
        let attributes = attributes("title = Raw Title\nlabel = Raw_Label");

        let parent = resolver().resolve(&attributes, None, None, DocumentKind::Parent);
        let child = resolver().resolve(&attributes, None, None, DocumentKind::Child);

        assert_eq!(parent.title, "Raw Title");
        assert_eq!(child.title, "Raw Label");
    }

    #[test]
    fn title_falls_back_to_stem() {
        let fields = resolver().resolve(&attributes("title =  "), None, None, DocumentKind::Parent);

        assert_eq!(fields.title, "grid_demg");
    }

    #[test]
    fn date_priority_and_truncation() {
        let resolver = resolver();

        let raw = resolver.resolve(
            &attributes("date = 2001_v2"),
            None,
            Some(&dataset()),
            DocumentKind::Child,
        );
        assert_eq!(raw.date, "2001");

        let from_dataset = resolver.resolve(&attributes(""), None, Some(&dataset()), DocumentKind::Child);
        assert_eq!(from_dataset.date, "2004");

        let unknown = resolver.resolve(&attributes("date = _v2"), None, None, DocumentKind::Child);
        assert_eq!(unknown.date, UNKNOWN_DATE);
    }

    #[test]
    fn abstract_falls_back_to_attribute_rendering() {
        let fields = resolver().resolve(&attributes("theme = Gravity"), None, None, DocumentKind::Child);

        assert_eq!(
            fields.abstract_text,
            r#"{"east":"150.5","filename":"grid_demg","north":"-23.5","south":"-30.25","theme":"Gravity","west":"140"}"#
        );
    }

    #[test]
    fn keywords_are_padded_and_truncated() {
        let resolver = resolver();

        let from_dataset = resolver.resolve(&attributes(""), None, Some(&dataset()), DocumentKind::Child);
        assert_eq!(
            from_dataset.keywords,
            ["Elevation", "Grid", "", "", ""].map(String::from)
        );

        let from_theme = resolver.resolve(&attributes("theme = Gravity"), None, None, DocumentKind::Child);
        assert_eq!(from_theme.keywords, ["Gravity", "", "", "", ""].map(String::from));

        let none = resolver.resolve(&attributes(""), None, None, DocumentKind::Child);
        assert_eq!(none.keywords, ["", "", "", "", ""].map(String::from));

        let mut long = survey();
        long.survey_type = "one two three four".into();
        long.data_type = "five six".into();
        let truncated = resolver.resolve(&attributes(""), Some(&long), None, DocumentKind::Parent);
        assert_eq!(
            truncated.keywords,
            ["one", "two", "three", "four", "five"].map(String::from)
        );
    }

    #[test]
    fn empty_survey_keywords_fall_through() {
        let mut survey = survey();
        survey.survey_type = " , ".into();
        survey.data_type = "".into();

        let fields = resolver().resolve(
            &attributes("theme = Gravity"),
            Some(&survey),
            None,
            DocumentKind::Parent,
        );

        assert_eq!(fields.keywords[0], "Gravity");
    }

    #[test]
    fn keyword_tokens_keep_combining_marks() {
        let mut survey = survey();
        survey.survey_type = "Cafe\u{301} Airborne\u{203f}Survey".into();
        survey.data_type = "".into();

        let fields = resolver().resolve(&attributes(""), Some(&survey), None, DocumentKind::Parent);

        assert_eq!(fields.keywords[0], "Cafe\u{301}");
        assert_eq!(fields.keywords[1], "Airborne\u{203f}Survey");
        assert_eq!(fields.keywords[2], "");
    }

    #[test]
    fn parent_bounds_use_numeric_overrides_only() {
        let fields = resolver().resolve(&attributes(""), Some(&survey()), None, DocumentKind::Parent);

        assert_eq!(fields.bounds.north, "-23.5");
        assert_eq!(fields.bounds.south, "-35");
        assert_eq!(fields.bounds.east, "150.5");
        assert_eq!(fields.bounds.west, "140");
    }

    #[test]
    fn parent_bounds_default_to_whole_earth() {
        let attributes =
            DatasetAttributes::from_text("a.isi", "a", "").with_bounds(&GeoBounds {
                north: "NaN".into(),
                south: "".into(),
                east: "east".into(),
                west: "inf".into(),
            });

        let fields = resolver().resolve(&attributes, Some(&survey()), None, DocumentKind::Parent);

        assert_eq!(fields.bounds.north, "90");
        assert_eq!(fields.bounds.south, "-35");
        assert_eq!(fields.bounds.east, "180");
        assert_eq!(fields.bounds.west, "-180");
    }

    #[test]
    fn child_bounds_are_taken_unconditionally() {
        let attributes = DatasetAttributes::from_text("a.isi", "a", "").with_bounds(&GeoBounds {
            north: "n/a".into(),
            south: "-1".into(),
            east: "2".into(),
            west: "3".into(),
        });

        let fields = resolver().resolve(&attributes, Some(&survey()), None, DocumentKind::Child);

        assert_eq!(fields.bounds.north, "n/a");
        assert_eq!(fields.bounds.south, "-1");
    }

    #[test]
    fn child_addresses() {
        let fields = resolver().resolve(&attributes(""), None, Some(&dataset()), DocumentKind::Child);

        assert_eq!(
            fields.addresses,
            Some(ServiceAddresses {
                wms: "http://maps/wms/grid_demg.nc4".into(),
                wcs: "http://maps/wcs/grid_demg.nc4".into(),
                www: "http://portal/grid.html".into(),
                layer_name: "grid_demg".into(),
            })
        );

        let without_url = resolver().resolve(&attributes(""), None, None, DocumentKind::Child);
        assert_eq!(without_url.addresses.unwrap().www, "");
    }

    #[test]
    fn required_fields_are_never_empty() {
        let empty = DatasetAttributes::from_text("x.isi", "x", "");
        let blank_survey = SurveyOverride {
            survey_id: "1".into(),
            ..Default::default()
        };
        let blank_dataset = DatasetOverride {
            filename: "x.isi".into(),
            ..Default::default()
        };

        for kind in [DocumentKind::Parent, DocumentKind::Child] {
            let fields = resolver().resolve(&empty, Some(&blank_survey), Some(&blank_dataset), kind);

            assert_eq!(fields.title, "x");
            assert_eq!(fields.date, UNKNOWN_DATE);
            assert!(!fields.abstract_text.is_empty());
            assert_eq!(fields.keywords.len(), KEYWORD_SLOTS);
            for bound in [
                &fields.bounds.north,
                &fields.bounds.south,
                &fields.bounds.east,
                &fields.bounds.west,
            ] {
                assert!(!bound.is_empty());
            }
        }
    }

    #[test]
    fn field_maps_cover_every_placeholder() {
        let fields = resolver().resolve(&attributes(""), None, Some(&dataset()), DocumentKind::Child);
        let identifier = Uuid::new_v4();
        let parent_identifier = Uuid::new_v4();

        let child = fields.to_child_fields(&identifier, &parent_identifier);
        for &placeholder in DocumentKind::Child.placeholders() {
            assert!(child.get(placeholder).is_some(), "{:?} missing", placeholder);
        }
        assert_eq!(
            child.get(Placeholder::ParentUuid),
            Some(parent_identifier.to_string().as_str())
        );

        let parent = fields.to_parent_fields(&parent_identifier);
        for &placeholder in DocumentKind::Parent.placeholders() {
            assert!(parent.get(placeholder).is_some(), "{:?} missing", placeholder);
        }
    }
}
