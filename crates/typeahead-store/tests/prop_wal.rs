use proptest::prelude::*;
use tempfile::tempdir;
use typeahead_store::wal::{Wal, WalEntry, WalSyncMode};

fn arb_entry() -> impl Strategy<Value = WalEntry> {
    prop_oneof![
        (any::<u32>(), any::<u32>(), any::<i64>(), any::<i64>()).prop_map(
            |(source, target, strength, timestamp)| WalEntry::SetWeight {
                source,
                target,
                strength,
                timestamp,
            }
        ),
        (any::<u32>(), any::<u32>(), any::<i64>()).prop_map(|(source, target, timestamp)| {
            WalEntry::Remove {
                source,
                target,
                timestamp,
            }
        }),
    ]
}

fn arb_entries() -> impl Strategy<Value = Vec<WalEntry>> {
    proptest::collection::vec(arb_entry(), 1..50)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    #[test]
    fn append_then_replay_round_trips(entries in arb_entries()) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");

        {
            let mut wal = Wal::open(&path, WalSyncMode::Async).unwrap();
            for entry in &entries {
                wal.append(entry).unwrap();
            }
            wal.sync().unwrap();
        }

        let mut replayed = Vec::new();
        Wal::replay(&path, |entry| replayed.push(entry)).unwrap();
        prop_assert_eq!(&replayed, &entries);
    }

    #[test]
    fn truncated_tail_recovers_a_valid_prefix(entries in arb_entries(), cut_bytes in 1usize..100usize) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");

        {
            let mut wal = Wal::open(&path, WalSyncMode::Async).unwrap();
            for entry in &entries {
                wal.append(entry).unwrap();
            }
            wal.sync().unwrap();
        }

        let file_len = std::fs::metadata(&path).unwrap().len();
        if file_len > cut_bytes as u64 {
            let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
            file.set_len(file_len - cut_bytes as u64).unwrap();
        }

        let mut replayed = Vec::new();
        let res = Wal::replay(&path, |entry| replayed.push(entry));
        prop_assert!(res.is_ok());

        for (original, recovered) in entries.iter().zip(replayed.iter()) {
            prop_assert_eq!(original, recovered);
        }
    }
}
