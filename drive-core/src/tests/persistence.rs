use super::support::test_rng;
use super::*;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn scratch_dir(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_nanos());
    std::env::temp_dir().join(format!(
        "drive-core-{tag}-{}-{nanos}",
        std::process::id()
    ))
}

#[test]
fn checkpoint_key_uses_car_seed_prefix_and_level() {
    let seed = derive_seed("beograd", 100);
    let key = checkpoint_key(CarId(42), &seed, 3);
    assert_eq!(key, "brain-42-8113470811347081-3");
    assert_eq!(checkpoint_key(CarId(42), &seed, 3), key);
    assert_eq!(checkpoint_key(CarId(1), "12", 1), "brain-1-12-1");
}

#[test]
fn memory_store_overwrites_and_deletes() {
    let mut store = MemoryBrainStore::new();
    assert!(store.is_empty());

    store.put("a", "1").expect("put");
    store.put("a", "2").expect("put");
    store.put("b", "3").expect("put");
    assert_eq!(store.len(), 2);
    assert_eq!(store.get("a").expect("get").as_deref(), Some("2"));
    assert_eq!(store.keys().collect::<Vec<_>>(), vec!["a", "b"]);

    store.delete("a").expect("delete");
    store.delete("a").expect("deleting twice is fine");
    assert_eq!(store.get("a").expect("get"), None);
}

#[test]
fn file_store_persists_brains_across_handles() {
    let dir = scratch_dir("roundtrip");
    let brain = random_brain(&[5, 6, 4], &mut test_rng(30)).expect("valid topology");
    let raw = encode_brain(&brain).expect("encode");

    let mut store = FileBrainStore::open(&dir).expect("open store");
    assert_eq!(store.get(BEST_BRAIN_KEY).expect("get"), None);
    store.put(BEST_BRAIN_KEY, &raw).expect("put");
    assert!(dir.join("best-brain.json").is_file());
    assert!(!dir.join("best-brain.json.tmp").exists());

    let reopened = FileBrainStore::open(&dir).expect("reopen store");
    let loaded = reopened.get(BEST_BRAIN_KEY).expect("get").expect("present");
    assert_eq!(decode_brain(&loaded).expect("decode"), brain);

    store.delete(BEST_BRAIN_KEY).expect("delete");
    store.delete(BEST_BRAIN_KEY).expect("deleting twice is fine");
    assert_eq!(reopened.get(BEST_BRAIN_KEY).expect("get"), None);

    std::fs::remove_dir_all(&dir).expect("clean up scratch dir");
}

#[test]
fn file_store_rejects_keys_that_escape_its_directory() {
    let dir = scratch_dir("keys");
    let mut store = FileBrainStore::open(&dir).expect("open store");

    for key in ["", "../best-brain", "a/b", "brain.json"] {
        assert!(matches!(
            store.put(key, "{}"),
            Err(StoreError::InvalidKey(_))
        ));
        assert!(matches!(store.get(key), Err(StoreError::InvalidKey(_))));
    }

    std::fs::remove_dir_all(&dir).expect("clean up scratch dir");
}

#[test]
fn engine_seeds_from_file_store() {
    let dir = scratch_dir("engine");
    let saved = random_brain(&[5, 6, 4], &mut test_rng(31)).expect("valid topology");
    let mut store = FileBrainStore::open(&dir).expect("open store");
    store
        .put(BEST_BRAIN_KEY, &encode_brain(&saved).expect("encode"))
        .expect("put");

    let config = super::support::test_config(3, 2);
    let mut sim = Simulation::new(config, Box::new(store)).expect("simulation");
    assert_eq!(sim.cars()[0].brain(), Some(&saved));

    sim.delete_saved().expect("delete");
    assert!(!dir.join("best-brain.json").exists());

    std::fs::remove_dir_all(&dir).expect("clean up scratch dir");
}
