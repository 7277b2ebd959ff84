//! Header-to-category rules, one per header schema.
//!
//! Frames written before [`SCHEMA_CUTOVER`] carry the category spread over
//! IMGTYPE, OBJTYPE, OBJECT and OBJNAME; later frames put it in IMGTYPE
//! alone. Both rules stay in the table so old nights reprocess unchanged.

use super::Category;
use crate::frame::FrameHeader;

/// First UT date (YYYYMMDD) written with the IMGTYPE-only schema.
pub const SCHEMA_CUTOVER: u32 = 20181210;

pub struct ClassificationRule {
    pub name: &'static str,
    /// First UT date (YYYYMMDD) the rule applies to; `None` for the oldest.
    pub effective_from: Option<u32>,
    pub classify: fn(&FrameHeader) -> Category,
}

pub static RULES: [ClassificationRule; 2] = [
    ClassificationRule {
        name: "legacy-objtype",
        effective_from: None,
        classify: classify_legacy,
    },
    ClassificationRule {
        name: "imgtype",
        effective_from: Some(SCHEMA_CUTOVER),
        classify: classify_by_imgtype,
    },
];

/// Latest rule in effect on `ut_date`. Frames of unknown date use the
/// newest rule.
pub fn select_rule(ut_date: Option<u32>) -> &'static ClassificationRule {
    let Some(date) = ut_date else {
        return &RULES[RULES.len() - 1];
    };
    RULES
        .iter()
        .rev()
        .find(|rule| rule.effective_from.map_or(true, |from| date >= from))
        .unwrap_or(&RULES[0])
}

/// Keyword matching shared by both schemas.
pub fn category_from_text(text: &str) -> Category {
    let upper = text.trim().to_ascii_uppercase();
    if upper.contains("BIAS") {
        Category::Bias
    } else if upper.contains("DOME") {
        Category::DomeFlat
    } else if upper.contains("TWILIGHT") || upper.contains("TWLIGHT") {
        Category::TwilightFlat
    } else if upper.contains("FOCUS") {
        Category::Focus
    } else if upper.contains("ACQ") {
        Category::Acquisition
    } else if upper.contains("STANDARD") {
        Category::Standard
    } else if upper.contains("SCIENCE") || upper.contains("TRANSIENT") {
        Category::Science
    } else if upper.contains("POINTING") {
        Category::Pointing
    } else if upper.contains("NA") {
        Category::NotApplicable
    } else {
        Category::Unknown
    }
}

pub fn classify_by_imgtype(header: &FrameHeader) -> Category {
    header
        .imgtype
        .as_deref()
        .map(category_from_text)
        .unwrap_or(Category::Unknown)
}

pub fn classify_legacy(header: &FrameHeader) -> Category {
    let imgtype = header.imgtype.as_deref().unwrap_or("None");
    let imgtype_lower = imgtype.to_lowercase();
    let objtype = header.objtype.as_deref().unwrap_or("None");
    let object_lower = header.object.as_deref().unwrap_or("None").to_lowercase();
    let names_twilight = |s: &str| s.contains("twilight") || s.contains("twlight");

    if imgtype_lower.contains("dome") {
        return Category::DomeFlat;
    }
    if imgtype_lower.contains("bias") {
        return Category::Bias;
    }

    if imgtype_lower.contains("science") {
        if objtype.to_lowercase().contains("calibration") {
            let objname = header.objname.as_deref().unwrap_or("").to_lowercase();
            return if names_twilight(&objname) {
                Category::TwilightFlat
            } else if objname.contains("focus") || object_lower.contains("focus") {
                Category::Focus
            } else {
                Category::Unknown
            };
        }
        if objtype.contains("Twilight") {
            return Category::TwilightFlat;
        }
        if objtype.contains("TRANSIENT") || objtype.contains("SHOT") {
            return Category::Science;
        }
        let objtype_text = objtype.trim();
        if objtype_text.is_empty() {
            return if object_lower.contains("finding") {
                Category::Acquisition
            } else {
                Category::Unknown
            };
        }
        return category_from_text(objtype_text);
    }

    if imgtype.contains("Twilight") {
        return Category::TwilightFlat;
    }
    if imgtype.contains("lamp") {
        return if names_twilight(&object_lower) {
            Category::TwilightFlat
        } else {
            category_from_text(objtype)
        };
    }
    if object_lower.contains("focus") {
        return Category::Focus;
    }
    if imgtype_lower.contains("standard") {
        return Category::Standard;
    }
    category_from_text(objtype)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(imgtype: &str) -> FrameHeader {
        FrameHeader {
            imgtype: Some(imgtype.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_select_rule_by_date() {
        assert_eq!(select_rule(Some(20181209)).name, "legacy-objtype");
        assert_eq!(select_rule(Some(SCHEMA_CUTOVER)).name, "imgtype");
        assert_eq!(select_rule(Some(20240502)).name, "imgtype");
        assert_eq!(select_rule(None).name, "imgtype");
        assert_eq!(select_rule(Some(20160101)).name, "legacy-objtype");
    }

    #[test]
    fn test_imgtype_rule() {
        let cases = [
            ("BIAS", Category::Bias),
            ("DOME", Category::DomeFlat),
            ("TWILIGHT", Category::TwilightFlat),
            ("FOCUS", Category::Focus),
            ("ACQUISITION", Category::Acquisition),
            ("SCIENCE", Category::Science),
            ("STANDARD", Category::Standard),
            ("POINTING", Category::Pointing),
            ("NA", Category::NotApplicable),
            ("na-engineering", Category::NotApplicable),
            ("GUIDER", Category::Unknown),
        ];
        for (imgtype, expected) in cases {
            assert_eq!(classify_by_imgtype(&header(imgtype)), expected, "{imgtype}");
        }
        assert_eq!(classify_by_imgtype(&FrameHeader::default()), Category::Unknown);
    }

    #[test]
    fn test_legacy_rule_uses_objtype_and_names() {
        let calib_twilight = FrameHeader {
            imgtype: Some("SCIENCE".into()),
            objtype: Some("Calibration".into()),
            objname: Some("twilight flat r".into()),
            ..Default::default()
        };
        assert_eq!(classify_legacy(&calib_twilight), Category::TwilightFlat);

        let calib_focus = FrameHeader {
            imgtype: Some("SCIENCE".into()),
            objtype: Some("Calibration".into()),
            objname: Some("sweep".into()),
            object: Some("Focus loop".into()),
            ..Default::default()
        };
        assert_eq!(classify_legacy(&calib_focus), Category::Focus);

        let transient = FrameHeader {
            imgtype: Some("SCIENCE".into()),
            objtype: Some("TRANSIENT".into()),
            ..Default::default()
        };
        assert_eq!(classify_legacy(&transient), Category::Science);

        let finding = FrameHeader {
            imgtype: Some("SCIENCE".into()),
            objtype: Some(" ".into()),
            object: Some("Finding chart ZTF18".into()),
            ..Default::default()
        };
        assert_eq!(classify_legacy(&finding), Category::Acquisition);

        let lamp = FrameHeader {
            imgtype: Some("lamp".into()),
            object: Some("Twlight r".into()),
            ..Default::default()
        };
        assert_eq!(classify_legacy(&lamp), Category::TwilightFlat);

        assert_eq!(classify_legacy(&header("dome")), Category::DomeFlat);
        assert_eq!(classify_legacy(&header("Bias")), Category::Bias);
        assert_eq!(classify_legacy(&header("standard")), Category::Standard);
    }

    #[test]
    fn test_schemas_disagree_on_same_header() {
        // IMGTYPE=SCIENCE with a calibration OBJTYPE was a twilight flat
        // under the old schema, plain science under the new one.
        let h = FrameHeader {
            imgtype: Some("SCIENCE".into()),
            objtype: Some("Calibration".into()),
            objname: Some("twilight".into()),
            ..Default::default()
        };
        assert_eq!(classify_legacy(&h), Category::TwilightFlat);
        assert_eq!(classify_by_imgtype(&h), Category::Science);
    }
}
