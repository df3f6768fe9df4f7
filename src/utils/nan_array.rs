//! Serde helpers for `f64` arrays that may contain NaN.
//!
//! JSON has no NaN, so `serde_json` writes it as `null` and refuses `null` when
//! reading an `f64`. Use these with `#[serde(with = "...")]` to write arrays in
//! ndarray's own `{"v": 1, "dim": [...], "data": [...]}` layout, with NaN stored
//! as `null` and read back as NaN.
use std::collections::BTreeMap;

use ndarray::{Array, Dimension};
use serde::{de, ser::SerializeMap, Deserialize, Deserializer, Serialize, Serializer};

const ARRAY_FORMAT_VERSION: u8 = 1;

#[derive(Serialize, Deserialize)]
struct NanArray<D> {
    v: u8,
    dim: D,
    data: Vec<Option<f64>>,
}

impl<D: Dimension> NanArray<D> {
    fn from_array(arr: &Array<f64, D>) -> Self {
        let data = arr.iter()
            .map(|&v| if v.is_nan() { None } else { Some(v) })
            .collect();
        Self { v: ARRAY_FORMAT_VERSION, dim: arr.raw_dim(), data }
    }

    fn into_array(self) -> Result<Array<f64, D>, String> {
        if self.v != ARRAY_FORMAT_VERSION {
            return Err(format!("unknown array version {}, expected {ARRAY_FORMAT_VERSION}", self.v));
        }
        let data = self.data.into_iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect();
        Array::from_shape_vec(self.dim, data)
            .map_err(|e| format!("array data does not match its dimensions: {e}"))
    }
}

pub fn serialize<S, D>(arr: &Array<f64, D>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    D: Dimension + Serialize,
{
    NanArray::from_array(arr).serialize(serializer)
}

pub fn deserialize<'de, De, D>(deserializer: De) -> Result<Array<f64, D>, De::Error>
where
    De: Deserializer<'de>,
    D: Dimension + Deserialize<'de>,
{
    NanArray::<D>::deserialize(deserializer)?
        .into_array()
        .map_err(de::Error::custom)
}

/// The same for a map of named arrays.
pub mod map {
    use super::*;

    pub fn serialize<S, D>(arrays: &BTreeMap<String, Array<f64, D>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        D: Dimension + Serialize,
    {
        let mut map = serializer.serialize_map(Some(arrays.len()))?;
        for (name, arr) in arrays.iter() {
            map.serialize_entry(name, &NanArray::from_array(arr))?;
        }
        map.end()
    }

    pub fn deserialize<'de, De, D>(deserializer: De) -> Result<BTreeMap<String, Array<f64, D>>, De::Error>
    where
        De: Deserializer<'de>,
        D: Dimension + Deserialize<'de>,
    {
        BTreeMap::<String, NanArray<D>>::deserialize(deserializer)?
            .into_iter()
            .map(|(name, raw)| {
                raw.into_array()
                    .map(|arr| (name.clone(), arr))
                    .map_err(|e| de::Error::custom(format!("{name}: {e}")))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{arr2, Array3, ArrayD, Ix3, IxDyn};

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Holder {
        #[serde(with = "super")]
        field: ArrayD<f64>,
        #[serde(with = "super::map")]
        named: BTreeMap<String, Array3<f64>>,
    }

    #[test]
    fn test_nan_survives_json() {
        let field = arr2(&[[1.0, f64::NAN], [3.0, 4.0]]).into_dyn();
        let mut named = BTreeMap::new();
        named.insert("CO".to_string(), Array3::from_shape_vec((1, 1, 2), vec![f64::NAN, 0.5]).unwrap());
        let s = serde_json::to_string(&Holder { field, named }).unwrap();
        assert!(s.contains(r#""data":[1.0,null,3.0,4.0]"#));

        let back: Holder = serde_json::from_str(&s).unwrap();
        assert_eq!(back.field.shape(), &[2, 2]);
        assert!(back.field[[0, 1]].is_nan());
        assert_eq!(back.field[[1, 1]], 4.0);
        assert!(back.named["CO"][[0, 0, 0]].is_nan());
        assert_eq!(back.named["CO"][[0, 0, 1]], 0.5);
    }

    #[test]
    fn test_reads_plain_ndarray_layout() {
        let plain = ArrayD::from_shape_vec(IxDyn(&[3]), vec![1.0, 2.0, 3.0]).unwrap();
        let s = serde_json::to_string(&plain).unwrap();
        let mut de = serde_json::Deserializer::from_str(&s);
        let back: ArrayD<f64> = deserialize(&mut de).unwrap();
        assert_eq!(back, plain);
    }

    #[test]
    fn test_bad_shape_rejected() {
        let mut de = serde_json::Deserializer::from_str(r#"{"v": 1, "dim": [2, 1, 1], "data": [1.0]}"#);
        assert!(deserialize::<_, Ix3>(&mut de).is_err());
    }
}
