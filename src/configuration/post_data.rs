use percent_encoding::percent_decode_str;

#[derive(Debug, Default)]
struct PostDataElement {
    key: String,
    value: String,
}

/// Fields of a url-encoded form submission, in submission order.
#[derive(Debug, Default)]
pub struct PostData {
    params: Vec<PostDataElement>,
}

impl PostData {
    pub fn from_string(s: &str) -> Self {
        let mut postdata = Self::default();

        for data in s.split('&').filter(|d| !d.is_empty()) {
            let (key, value) = data.split_once('=').unwrap_or((data, ""));

            postdata.params.push(PostDataElement {
                key: Self::decode(key),
                value: Self::decode(value),
            });
        }

        postdata
    }

    /// First value submitted for `key`.
    pub fn read_value(&self, key: &str) -> Option<String> {
        self.params
            .iter()
            .find(|&x| x.key == key)
            .map(|x| x.value.clone())
    }

    pub fn is_key_exists(&self, key: &str) -> bool {
        self.params.iter().any(|x| x.key == key)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    fn decode(s: &str) -> String {
        percent_decode_str(&s.replace('+', " "))
            .decode_utf8_lossy()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_form() {
        let data = PostData::from_string(
            "sensor_1_name=Fresh+water&sensor_1_type=water_tank&calibration=%5B%5B0%2C1%5D%5D",
        );

        assert_eq!(data.len(), 3);
        assert_eq!(data.read_value("sensor_1_name"), Some("Fresh water".to_string()));
        assert_eq!(data.read_value("calibration"), Some("[[0,1]]".to_string()));
        assert!(data.is_key_exists("sensor_1_type"));
        assert!(!data.is_key_exists("sensor_2_type"));
    }

    #[test]
    fn test_first_value_wins_and_bare_keys() {
        let data = PostData::from_string("a=1&a=2&flag&&b=");

        assert_eq!(data.read_value("a"), Some("1".to_string()));
        assert_eq!(data.read_value("flag"), Some("".to_string()));
        assert_eq!(data.read_value("b"), Some("".to_string()));
        assert_eq!(data.len(), 4);
    }

    #[test]
    fn test_empty() {
        assert!(PostData::from_string("").is_empty());
    }
}
