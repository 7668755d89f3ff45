use crate::config::AptrustConfig;

/// Ordered `bag-info.txt` fields
pub type BagInfo = Vec<(String, String)>;

/// APTrust fields for `bag-info.txt`
///
/// `bag_count` is `(position, total)` within the bag group.
pub fn bagit_info(aptrust: &AptrustConfig, noid: &str, bag_count: (u32, u32)) -> BagInfo {
    vec![
        (
            "Source-Organization".to_string(),
            aptrust.organization.clone(),
        ),
        (
            "Internal-Sender-Description".to_string(),
            aptrust.description.clone(),
        ),
        ("Internal-Sender-Identifier".to_string(), noid.to_string()),
        ("Bag-Group-Identifier".to_string(), aptrust.group_id.clone()),
        (
            "Bag-Count".to_string(),
            format!("{} of {}", bag_count.0, bag_count.1),
        ),
    ]
}

/// Contents of the APTrust `aptrust-info.txt` tag file
pub fn aptrust_info(aptrust: &AptrustConfig, title: &str, description: &str) -> String {
    format!(
        "Title: {}\nDescription: {}\nAccess: {}\nStorage-Option: {}\n",
        single_line(title),
        single_line(description),
        aptrust.access_level,
        aptrust.storage_option
    )
}

/// Tag files are line-oriented; fold embedded newlines into spaces
fn single_line(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Bag name for a noid: `<bag_prefix><noid>`
pub fn bag_name(aptrust: &AptrustConfig, noid: &str) -> String {
    format!("{}{}", aptrust.bag_prefix, noid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aptrust() -> AptrustConfig {
        AptrustConfig {
            organization: "VT".to_string(),
            group_id: "12345".to_string(),
            description: "Desc".to_string(),
            ..Default::default()
        }
    }

    fn field<'a>(info: &'a BagInfo, key: &str) -> &'a str {
        info.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .unwrap()
    }

    #[test]
    fn test_bagit_info() {
        let info = bagit_info(&aptrust(), "zxcvb", (1, 1));
        assert_eq!(field(&info, "Source-Organization"), "VT");
        assert_eq!(field(&info, "Internal-Sender-Description"), "Desc");
        assert_eq!(field(&info, "Internal-Sender-Identifier"), "zxcvb");
        assert_eq!(field(&info, "Bag-Group-Identifier"), "12345");
        assert_eq!(field(&info, "Bag-Count"), "1 of 1");
    }

    #[test]
    fn test_aptrust_info() {
        let config = AptrustConfig {
            access_level: "Institution".to_string(),
            storage_option: "Standard".to_string(),
            ..Default::default()
        };
        assert_eq!(
            aptrust_info(&config, "Title", "Desc"),
            "Title: Title\nDescription: Desc\nAccess: Institution\nStorage-Option: Standard\n"
        );
    }

    #[test]
    fn test_aptrust_info_folds_newlines() {
        let out = aptrust_info(&aptrust(), "Two\nLines", "  spaced   out ");
        assert!(out.starts_with("Title: Two Lines\nDescription: spaced out\n"));
    }

    #[test]
    fn test_bag_name() {
        let config = AptrustConfig {
            bag_prefix: "vt.edu.".to_string(),
            ..Default::default()
        };
        assert_eq!(bag_name(&config, "b3x9"), "vt.edu.b3x9");
    }
}
