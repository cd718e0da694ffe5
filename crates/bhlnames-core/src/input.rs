//! Query input: a scientific name plus an optional bibliographic reference.
//!
//! Inputs arrive either from the command line (built with [`InputBuilder`]) or
//! as JSON lines. In both cases [`Input::complete`] fills the fields that can be
//! derived from the raw name-string and reference-string.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::names;

/// Data about a scientific name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NameQuery {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name_string: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub canonical: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub authors: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub year: i32,
}

/// Data about a reference where the name was mentioned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RefQuery {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ref_string: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub year_start: i32,
    #[serde(skip_serializing_if = "is_zero")]
    pub year_end: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub authors: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub journal: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub volume: i32,
    #[serde(skip_serializing_if = "is_zero")]
    pub page_start: i32,
    #[serde(skip_serializing_if = "is_zero")]
    pub page_end: i32,
}

impl RefQuery {
    /// True when the caller supplied anything about the reference.
    pub fn is_present(&self) -> bool {
        !self.ref_string.is_empty()
            || self.year_start != 0
            || self.volume != 0
            || self.page_start != 0
            || !self.journal.is_empty()
    }
}

/// Per-query search parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Params {
    /// Look for the nomenclatural event of the name.
    #[serde(rename = "nomenEvent")]
    pub with_nomen_event: bool,
    /// Expand the search to all synonyms of the taxon.
    #[serde(rename = "taxon")]
    pub with_taxon: bool,
    /// Return only metadata about found references.
    #[serde(rename = "shortenedOutput")]
    pub with_shortened_output: bool,
    /// Sort from the latest year to the earliest.
    pub sort_desc: bool,
    /// Maximum number of references to return, 0 means all.
    pub refs_limit: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Input {
    /// Identifier used to correlate streamed results with queries.
    pub id: String,
    pub name: NameQuery,
    pub reference: RefQuery,
    pub params: Params,
}

impl Input {
    pub fn builder() -> InputBuilder {
        InputBuilder::default()
    }

    /// Fill the identifier and every field that can be parsed out of the
    /// name-string and the reference-string. Fields set by the caller are
    /// never overwritten.
    pub fn complete(mut self) -> Self {
        if self.id.is_empty() {
            self.id = uuid::Uuid::new_v4().to_string();
        }

        if !self.name.name_string.is_empty()
            && self.name.canonical.is_empty()
            && let Some(parsed) = names::parse(&self.name.name_string)
        {
            self.name.canonical = parsed.canonical;
            self.name.authors = parsed.authors;
            if self.name.year == 0 {
                self.name.year = parsed.year.unwrap_or(0);
            }
        }

        if !self.reference.ref_string.is_empty() {
            parse_ref_string(&mut self.reference);
        }

        // a nomenclatural event search needs only the best few references
        if self.params.with_nomen_event && self.params.refs_limit == 0 {
            self.params.refs_limit = 3;
        }
        self
    }

    /// Year used for scoring: the reference year if known, otherwise the
    /// year from the name authorship.
    pub fn query_year(&self) -> i32 {
        if self.reference.is_present() && self.reference.year_start != 0 {
            self.reference.year_start
        } else {
            self.name.year
        }
    }

    /// Canonical form if known, otherwise the raw name-string.
    pub fn name_key(&self) -> &str {
        if self.name.canonical.is_empty() {
            &self.name.name_string
        } else {
            &self.name.canonical
        }
    }
}

#[derive(Debug, Default)]
pub struct InputBuilder {
    input: Input,
}

impl InputBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.input.id = id.into();
        self
    }

    pub fn name_string(mut self, name: impl Into<String>) -> Self {
        self.input.name.name_string = name.into();
        self
    }

    pub fn name_year(mut self, year: i32) -> Self {
        self.input.name.year = year;
        self
    }

    pub fn ref_string(mut self, reference: impl Into<String>) -> Self {
        self.input.reference.ref_string = reference.into();
        self
    }

    pub fn refs_limit(mut self, limit: usize) -> Self {
        self.input.params.refs_limit = limit;
        self
    }

    pub fn sort_desc(mut self, desc: bool) -> Self {
        self.input.params.sort_desc = desc;
        self
    }

    pub fn with_nomen_event(mut self, yes: bool) -> Self {
        self.input.params.with_nomen_event = yes;
        self
    }

    pub fn with_taxon(mut self, yes: bool) -> Self {
        self.input.params.with_taxon = yes;
        self
    }

    pub fn with_shortened_output(mut self, yes: bool) -> Self {
        self.input.params.with_shortened_output = yes;
        self
    }

    pub fn build(self) -> Input {
        self.input.complete()
    }
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|p| Regex::new(p).unwrap()).collect()
}

// First matching pattern wins in every list.
static PAGE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        // 12: 188-189
        r"\d+\s*:\s*(\d+)\s*-{0,2}\s*(\d*)",
        // 12(issue): 188-189
        r"\d+\s*\(.+\)\s*:\s*(\d+)-{0,2}\s*(\d*)",
        // 188-189pp, 12p
        r"(\d+)\s*-{0,2}\s*(\d*)p{1,2}",
        // Pg. 20, P. 20, P20
        r"[Ppg]\.*\s*(\d+)",
    ])
});

static VOLUME_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\b[Vv]ol\.*\s*(\d+)",
        r"(\d+)\s*:\s*\d+",
        r"(\d+)\s*\(.+\)\s*:\s*\d+",
        r"[Vv]\.*\s*(\d+)",
        r"(\d+):\s*No",
    ])
});

static YEAR_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\((17|18|19|20)(\d\d)\s*-?\s*((17|18|19|20)(\d\d)|(\d\d))?\)",
        r"(17|18|19|20)(\d\d)\s*-?\s*((17|18|19|20)(\d\d)|(\d\d))?",
    ])
});

fn first_match<'a>(patterns: &[Regex], text: &'a str) -> Option<Captures<'a>> {
    patterns.iter().find_map(|re| re.captures(text))
}

fn group_int(caps: &Captures<'_>, i: usize) -> i32 {
    caps.get(i)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

fn parse_pages(text: &str) -> (i32, i32) {
    first_match(&PAGE_PATTERNS, text).map_or((0, 0), |c| (group_int(&c, 1), group_int(&c, 2)))
}

fn parse_volume(text: &str) -> i32 {
    first_match(&VOLUME_PATTERNS, text).map_or(0, |c| group_int(&c, 1))
}

fn parse_years(text: &str) -> (i32, i32) {
    let Some(caps) = first_match(&YEAR_PATTERNS, text) else {
        return (0, 0);
    };
    let century = caps.get(1).map_or("", |m| m.as_str());
    let decade = caps.get(2).map_or("", |m| m.as_str());
    let start = format!("{century}{decade}").parse().unwrap_or(0);

    // the end year either repeats the century (1850-1852) or omits it (1850-52)
    let end = caps
        .get(5)
        .or_else(|| caps.get(6))
        .and_then(|m| format!("{century}{}", m.as_str()).parse().ok())
        .unwrap_or(0);
    (start, end)
}

fn parse_ref_string(reference: &mut RefQuery) {
    let text = reference.ref_string.as_str();
    if reference.page_start == 0 {
        (reference.page_start, reference.page_end) = parse_pages(text);
    }
    if reference.year_start == 0 {
        (reference.year_start, reference.year_end) = parse_years(text);
    }
    if reference.volume == 0 {
        reference.volume = parse_volume(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Case {
        msg: &'static str,
        id: &'static str,
        name: &'static str,
        reference: &'static str,
        canonical: &'static str,
        authors: &'static str,
        name_year: i32,
        years: (i32, i32),
        volume: i32,
        pages: (i32, i32),
    }

    #[test]
    fn builds_inputs() {
        let cases = [
            Case {
                msg: "canonical only",
                id: "",
                name: "Bubo bubo",
                reference: "",
                canonical: "Bubo bubo",
                authors: "",
                name_year: 0,
                years: (0, 0),
                volume: 0,
                pages: (0, 0),
            },
            Case {
                msg: "id, authors, year",
                id: "123",
                name: "Bubo bubo (Linnaeus, 1758)",
                reference: "",
                canonical: "Bubo bubo",
                authors: "Linnaeus",
                name_year: 1758,
                years: (0, 0),
                volume: 0,
                pages: (0, 0),
            },
            Case {
                msg: "bad name",
                id: "",
                name: "1-noname",
                reference: "",
                canonical: "",
                authors: "",
                name_year: 0,
                years: (0, 0),
                volume: 0,
                pages: (0, 0),
            },
            Case {
                msg: "issue in parentheses",
                id: "234",
                name: "Achenium lusitanicum Skalitzky, 1884",
                reference: "Skalitzky, C. Zwei neue europäische Staphylinenarten aus Portugal. \
                            Wiener Entomologische Zeitung, 3 (4): 97-99. (1884).",
                canonical: "Achenium lusitanicum",
                authors: "Skalitzky",
                name_year: 1884,
                years: (1884, 0),
                volume: 3,
                pages: (97, 99),
            },
            Case {
                msg: "volume and pages",
                id: "74738",
                name: "Tasmanoonops inornatus Hickman, 1979",
                reference: "Hickman, V. V. Some Tasmanian spiders of the families Oonopidae, \
                            Anapidae and Mysmenidae. Papers and Proceedings of the Royal \
                            Society of Tasmania 113: 53-79. (1979).",
                canonical: "Tasmanoonops inornatus",
                authors: "Hickman",
                name_year: 1979,
                years: (1979, 0),
                volume: 113,
                pages: (53, 79),
            },
            Case {
                msg: "many numbers",
                id: "38483",
                name: "Scapanes australis (Boisduval, 1835)",
                reference: "Boisduval J.B. Voyage de découvertes de l’Astrolabe. Exécuté par \
                            ordre du Roi, pendant les années 1826, 1827, 1829, sous le \
                            commandement de M.J.Dumont d'Urville. Coléoptères et autres \
                            Ordres. Tatsu. Paris 2:1-716 (152-247). (1835).",
                canonical: "Scapanes australis",
                authors: "Boisduval",
                name_year: 1835,
                years: (1835, 0),
                volume: 2,
                pages: (1, 716),
            },
            Case {
                msg: "year range",
                id: "48949",
                name: "Meniscium guyanense Fée",
                reference: "Fée. In: Gen. 224. (1850-52).",
                canonical: "Meniscium guyanense",
                authors: "Fée",
                name_year: 0,
                years: (1850, 1852),
                volume: 0,
                pages: (0, 0),
            },
        ];

        for c in cases {
            let inp = Input::builder()
                .id(c.id)
                .name_string(c.name)
                .ref_string(c.reference)
                .build();
            if c.id.is_empty() {
                assert_eq!(inp.id.len(), 36, "{}", c.msg);
            } else {
                assert_eq!(inp.id, c.id, "{}", c.msg);
            }
            assert_eq!(inp.name.name_string, c.name, "{}", c.msg);
            assert_eq!(inp.name.canonical, c.canonical, "{}", c.msg);
            assert_eq!(inp.name.authors, c.authors, "{}", c.msg);
            assert_eq!(inp.name.year, c.name_year, "{}", c.msg);
            assert_eq!(
                (inp.reference.year_start, inp.reference.year_end),
                c.years,
                "{}",
                c.msg
            );
            assert_eq!(inp.reference.volume, c.volume, "{}", c.msg);
            assert_eq!(
                (inp.reference.page_start, inp.reference.page_end),
                c.pages,
                "{}",
                c.msg
            );
        }
    }

    #[test]
    fn nomen_event_limits_references() {
        let inp = Input::builder()
            .name_string("Bubo bubo")
            .with_nomen_event(true)
            .build();
        assert_eq!(inp.params.refs_limit, 3);

        let inp = Input::builder()
            .name_string("Bubo bubo")
            .with_nomen_event(true)
            .refs_limit(7)
            .build();
        assert_eq!(inp.params.refs_limit, 7);
    }

    #[test]
    fn query_year_prefers_reference() {
        let inp = Input::builder()
            .name_string("Bubo bubo (Linnaeus, 1758)")
            .build();
        assert_eq!(inp.query_year(), 1758);

        let inp = Input::builder()
            .name_string("Bubo bubo (Linnaeus, 1758)")
            .ref_string("Systema Naturae, vol. 1 (1760)")
            .build();
        assert_eq!(inp.query_year(), 1760);
        assert_eq!(inp.reference.volume, 1);
    }

    #[test]
    fn caller_fields_are_kept() {
        let mut inp = Input::default();
        inp.name.name_string = "Bubo bubo (Linnaeus, 1758)".into();
        inp.name.year = 1760;
        inp.reference.ref_string = "Some journal 3: 10-12 (1884)".into();
        inp.reference.page_start = 11;
        let inp = inp.complete();
        assert_eq!(inp.name.year, 1760);
        assert_eq!(inp.reference.page_start, 11);
        assert_eq!(inp.reference.page_end, 0);
        assert_eq!(inp.reference.volume, 3);
        assert_eq!(inp.reference.year_start, 1884);
    }

    #[test]
    fn deserializes_json_line() {
        let line = r#"{"id":"q1","name":{"nameString":"Bubo bubo"},"params":{"nomenEvent":true}}"#;
        let inp: Input = serde_json::from_str(line).unwrap();
        let inp = inp.complete();
        assert_eq!(inp.id, "q1");
        assert_eq!(inp.name.canonical, "Bubo bubo");
        assert!(inp.params.with_nomen_event);
        assert_eq!(inp.params.refs_limit, 3);
    }
}
