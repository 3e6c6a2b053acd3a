use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::api::{response::api_response, ApiStatus, Payload, Result};

use super::Endpoint;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RegexInput {
    pub pattern: String,
    pub text: String,
    #[serde(default)]
    pub flags: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RegexMatch {
    #[serde(rename = "match")]
    pub matched: String,
    pub start: usize,
    pub end: usize,
    #[serde(default)]
    pub groups: Vec<Option<String>>,
    #[serde(default)]
    pub named_groups: HashMap<String, Option<String>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RegexResponse {
    #[serde(flatten)]
    pub status: ApiStatus,
    #[serde(default)]
    pub matches: Vec<RegexMatch>,
    #[serde(default)]
    pub count: usize,
}

/// Plain text submitted to the extractors.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TextInput {
    pub text: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct KeywordExtractorResponse {
    #[serde(flatten)]
    pub status: ApiStatus,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub count: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct EmailExtractorResponse {
    #[serde(flatten)]
    pub status: ApiStatus,
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub count: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct UrlExtractorResponse {
    #[serde(flatten)]
    pub status: ApiStatus,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub count: usize,
}

api_response!(
    RegexResponse,
    KeywordExtractorResponse,
    EmailExtractorResponse,
    UrlExtractorResponse,
);

pub struct TestRegex;

impl Endpoint for TestRegex {
    type Input = RegexInput;
    type Output = RegexResponse;

    const PATH: &'static str = "regex/validate";

    fn payload(input: &Self::Input) -> Result<Payload> {
        Payload::json(input)
    }

    fn is_ready(input: &Self::Input) -> bool {
        !input.pattern.is_empty()
    }
}

macro_rules! text_extractor {
    ($name:ident, $path:literal, $output:ty) => {
        pub struct $name;

        impl Endpoint for $name {
            type Input = TextInput;
            type Output = $output;

            const PATH: &'static str = $path;

            fn payload(input: &Self::Input) -> Result<Payload> {
                Payload::json(input)
            }

            fn is_ready(input: &Self::Input) -> bool {
                !input.text.trim().is_empty()
            }
        }
    };
}

text_extractor!(ExtractKeywords, "text-extractor/keywords", KeywordExtractorResponse);
text_extractor!(ExtractEmails, "text-extractor/emails", EmailExtractorResponse);
text_extractor!(ExtractUrls, "text-extractor/urls", UrlExtractorResponse);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regex_response_decodes_matches() {
        let raw = r#"
            {
                "success": true,
                "message": "2 matches",
                "matches": [
                    { "match": "ab", "start": 0, "end": 2, "groups": ["b"], "named_groups": {} },
                    { "match": "ab", "start": 4, "end": 6, "groups": [null], "named_groups": { "x": null } }
                ],
                "count": 2
            }
        "#;

        let response: RegexResponse = serde_json::from_str(raw).unwrap();

        assert_eq!(response.count, 2);
        assert_eq!(response.matches[0].matched, "ab");
        assert_eq!(response.matches[1].groups, vec![None]);
        assert_eq!(response.matches[1].named_groups.get("x"), Some(&None));
    }
}
