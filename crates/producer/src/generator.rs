//! 合成负载生成器
//!
//! 生成模拟人员档案的 JSON 负载；分区键取发射时刻的毫秒时间戳，
//! 只参与分片路由，不携带业务含义。

use bytes::Bytes;
use chrono::{Local, Utc};
use contracts::Record;
use rand::Rng;
use serde::Serialize;

use crate::ProducerError;

const FIRST_NAMES: &[&str] = &[
    "Aiko", "Bruno", "Carmen", "Daichi", "Elena", "Felix", "Grace", "Hiro", "Ines", "Jonas",
    "Keiko", "Liam", "Mina", "Noah", "Olga", "Pablo",
];

const LAST_NAMES: &[&str] = &[
    "Abe", "Bishop", "Castro", "Doyle", "Endo", "Fischer", "Grant", "Hayashi", "Ito", "Jensen",
    "Kato", "Lindgren", "Mori", "Novak", "Okada", "Price",
];

const STREETS: &[&str] = &[
    "Maple", "Harbor", "Cedar", "Willow", "Juniper", "Birch", "Magnolia", "Chestnut",
];

const CITIES: &[&str] = &[
    "Portvale", "Eastbrook", "Kirkwall", "Sando", "Larchmont", "Newhaven", "Oakseld", "Rivermead",
];

const PET_TYPES: &[&str] = &["cat", "dog", "bird", "fish", "hamster", "turtle"];

const PET_NAMES: &[&str] = &[
    "Mochi", "Biscuit", "Pepper", "Sora", "Clover", "Nori", "Pickles", "Ziggy", "Maru", "Waffle",
];

/// 档案负载结构 (序列化为 JSON)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Person {
    id: u32,
    date: String,
    score: u64,
    first_name: String,
    last_name: String,
    address: String,
    pets: Vec<Pet>,
}

#[derive(Debug, Serialize)]
struct Pet {
    #[serde(rename = "type")]
    kind: String,
    name: String,
}

fn pick<'a>(rng: &mut impl Rng, words: &'a [&'a str]) -> &'a str {
    words[rng.random_range(0..words.len())]
}

/// 合成记录生成器
///
/// 每次调用产生一条独立记录；无内部状态，可被调度器的发射闭包复用。
#[derive(Debug, Default)]
pub struct RecordGenerator;

impl RecordGenerator {
    pub fn new() -> Self {
        Self
    }

    /// 生成下一条待发射记录
    pub fn next_record(&self) -> Result<Record, ProducerError> {
        let partition_key = Utc::now().timestamp_millis().to_string();
        let payload = serde_json::to_vec(&self.person())?;
        Ok(Record::new(partition_key, Bytes::from(payload)))
    }

    fn person(&self) -> Person {
        let mut rng = rand::rng();

        let pet_count = rng.random_range(0..10);
        let pets = (0..pet_count)
            .map(|_| Pet {
                kind: pick(&mut rng, PET_TYPES).to_string(),
                name: pick(&mut rng, PET_NAMES).to_string(),
            })
            .collect();

        Person {
            // 5 位 id，10 位 score，与既有下游解析器保持同形
            id: rng.random_range(10_000..100_000),
            date: Local::now().format("%Y/%m/%d %H:%M:%S").to_string(),
            score: rng.random_range(1_000_000_000..10_000_000_000),
            first_name: pick(&mut rng, FIRST_NAMES).to_string(),
            last_name: pick(&mut rng, LAST_NAMES).to_string(),
            address: format!(
                "{} {} St, {}",
                rng.random_range(1..1000),
                pick(&mut rng, STREETS),
                pick(&mut rng, CITIES)
            ),
            pets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use serde_json::Value;

    #[test]
    fn test_partition_key_is_epoch_millis() {
        let record = RecordGenerator::new().next_record().unwrap();
        let key: i64 = record.partition_key.parse().unwrap();
        let now = Utc::now().timestamp_millis();
        assert!((now - key).abs() < 10_000, "key {key} too far from now {now}");
    }

    #[test]
    fn test_payload_is_person_profile_json() {
        let record = RecordGenerator::new().next_record().unwrap();
        let value: Value = serde_json::from_slice(&record.payload).unwrap();

        let id = value["id"].as_u64().unwrap();
        assert!((10_000..100_000).contains(&id));

        let score = value["score"].as_u64().unwrap();
        assert!((1_000_000_000..10_000_000_000).contains(&score));

        let date = value["date"].as_str().unwrap();
        assert!(NaiveDateTime::parse_from_str(date, "%Y/%m/%d %H:%M:%S").is_ok());

        assert!(value["firstName"].is_string());
        assert!(value["lastName"].is_string());
        assert!(value["address"].is_string());

        let pets = value["pets"].as_array().unwrap();
        assert!(pets.len() < 10);
        for pet in pets {
            assert!(pet["type"].is_string());
            assert!(pet["name"].is_string());
        }
    }
}
