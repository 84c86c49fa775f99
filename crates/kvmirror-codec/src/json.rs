//! The default structured-text codec.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::Codec;
use crate::error::CodecResult;

/// JSON text codec for any `serde` type.
///
/// This is the codec every collection uses unless told otherwise. Note that
/// a `String` is stored quoted (`"alice"`), and that maps keyed by anything
/// other than strings are rejected by `serde_json` at encode time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JsonCodec;

impl<T> Codec<T> for JsonCodec
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &T) -> CodecResult<String> {
        Ok(serde_json::to_string(value)?)
    }

    fn decode(&self, text: &str) -> CodecResult<T> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use proptest::prelude::*;
    use serde::Deserialize;

    use super::*;
    use crate::error::CodecError;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct GroupRule {
        command: String,
        mask: u8,
        enabled: bool,
    }

    #[test]
    fn strings_are_quoted() {
        let text = Codec::<String>::encode(&JsonCodec, &"alice".to_string()).unwrap();
        assert_eq!(text, "\"alice\"");
    }

    #[test]
    fn decodes_struct() {
        let rule: GroupRule = JsonCodec
            .decode(r#"{"command":"GroupCmd","mask":3,"enabled":true}"#)
            .unwrap();
        assert_eq!(rule.command, "GroupCmd");
        assert_eq!(rule.mask, 3);
        assert!(rule.enabled);
    }

    #[test]
    fn rejects_malformed_text() {
        let err = Codec::<u32>::decode(&JsonCodec, "{not json").unwrap_err();
        assert!(matches!(err, CodecError::Json(_)));
    }

    #[test]
    fn rejects_foreign_shape() {
        let res: CodecResult<GroupRule> = JsonCodec.decode("[1,2,3]");
        assert!(res.is_err());
    }

    #[test]
    fn bare_word_is_not_json() {
        // A raw string written by another client is not valid JSON text.
        let res: CodecResult<String> = JsonCodec.decode("alice");
        assert!(res.is_err());
    }

    proptest! {
        #[test]
        fn roundtrip_i64(v in any::<i64>()) {
            let text = JsonCodec.encode(&v).unwrap();
            let back: i64 = JsonCodec.decode(&text).unwrap();
            prop_assert_eq!(back, v);
        }

        #[test]
        fn roundtrip_string(v in ".*") {
            let text = JsonCodec.encode(&v).unwrap();
            let back: String = JsonCodec.decode(&text).unwrap();
            prop_assert_eq!(back, v);
        }

        #[test]
        fn roundtrip_struct(command in "[A-Za-z]{1,12}", mask in any::<u8>(), enabled in any::<bool>()) {
            let v = GroupRule { command, mask, enabled };
            let text = JsonCodec.encode(&v).unwrap();
            let back: GroupRule = JsonCodec.decode(&text).unwrap();
            prop_assert_eq!(back, v);
        }

        #[test]
        fn roundtrip_string_map(v in prop::collection::btree_map(".*", any::<u32>(), 0..8)) {
            let text = JsonCodec.encode(&v).unwrap();
            let back: BTreeMap<String, u32> = JsonCodec.decode(&text).unwrap();
            prop_assert_eq!(back, v);
        }
    }
}
