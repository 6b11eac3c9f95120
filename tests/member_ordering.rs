use bureau_api::store::{FailPoint, MemberRow, MemberTx, RankRange};
use bureau_api::{AppError, Member, MemberId, MemberInput, MemberService, MemberStore, MemoryMemberStore};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

fn service(store: &MemoryMemberStore) -> MemberService {
    MemberService::new(Arc::new(store.clone()))
}

fn create_input(nom: &str, ordre: Option<i64>) -> MemberInput {
    let mut body = json!({ "poste": "Bureau", "nom": nom, "fonction": "Membre" });
    if let Some(o) = ordre {
        body["ordre"] = json!(o);
    }
    MemberInput::from_json(body).unwrap()
}

fn rank_input(ordre: i64) -> MemberInput {
    MemberInput::from_json(json!({ "ordre": ordre })).unwrap()
}

async fn ranks_by_name(svc: &MemberService) -> HashMap<String, i32> {
    svc.list().await.unwrap().into_iter().map(|m| (m.nom, m.rank)).collect()
}

fn assert_dense(members: &[Member]) {
    let mut ranked: Vec<i32> = members.iter().map(|m| m.rank).filter(|r| *r > 0).collect();
    ranked.sort_unstable();
    let expected: Vec<i32> = (1..=ranked.len() as i32).collect();
    assert_eq!(ranked, expected, "ranks not dense: {:?}", members);
}

#[tokio::test]
async fn move_then_delete_scenario() {
    let store = MemoryMemberStore::new();
    let svc = service(&store);
    let _a = svc.create(create_input("A", Some(1))).await.unwrap();
    let b = svc.create(create_input("B", Some(2))).await.unwrap();
    let c = svc.create(create_input("C", Some(3))).await.unwrap();

    svc.update(c, rank_input(1)).await.unwrap();
    let ranks = ranks_by_name(&svc).await;
    assert_eq!(ranks["A"], 2);
    assert_eq!(ranks["B"], 3);
    assert_eq!(ranks["C"], 1);

    svc.delete(b).await.unwrap();
    let all = svc.list().await.unwrap();
    let names: Vec<(&str, i32)> = all.iter().map(|m| (m.nom.as_str(), m.rank)).collect();
    assert_eq!(names, vec![("C", 1), ("A", 2)]);
}

#[tokio::test]
async fn unranked_members_sort_first() {
    let store = MemoryMemberStore::new();
    let svc = service(&store);
    svc.create(create_input("A", Some(1))).await.unwrap();
    svc.create(create_input("C", Some(2))).await.unwrap();
    let d = svc.create(create_input("D", None)).await.unwrap();

    assert_eq!(svc.get(d).await.unwrap().rank, 0);
    let names: Vec<String> = svc.list().await.unwrap().into_iter().map(|m| m.nom).collect();
    assert_eq!(names, vec!["D", "A", "C"]);
}

#[tokio::test]
async fn insert_lands_between_neighbours() {
    let store = MemoryMemberStore::new();
    let svc = service(&store);
    for (i, nom) in ["A", "B", "C"].iter().enumerate() {
        svc.create(create_input(nom, Some(i as i64 + 1))).await.unwrap();
    }
    svc.create(create_input("X", Some(2))).await.unwrap();

    let names: Vec<String> = svc.list().await.unwrap().into_iter().map(|m| m.nom).collect();
    assert_eq!(names, vec!["A", "X", "B", "C"]);
    assert_dense(&svc.list().await.unwrap());
}

#[tokio::test]
async fn insert_past_the_end_is_appended() {
    let store = MemoryMemberStore::new();
    let svc = service(&store);
    svc.create(create_input("A", Some(1))).await.unwrap();
    let z = svc.create(create_input("Z", Some(40))).await.unwrap();
    assert_eq!(svc.get(z).await.unwrap().rank, 2);
}

#[tokio::test]
async fn same_rank_move_changes_nothing() {
    let store = MemoryMemberStore::new();
    let svc = service(&store);
    svc.create(create_input("A", Some(1))).await.unwrap();
    let b = svc.create(create_input("B", Some(2))).await.unwrap();
    svc.create(create_input("C", Some(3))).await.unwrap();
    let before = svc.list().await.unwrap();

    svc.update(b, rank_input(2)).await.unwrap();
    let after = svc.list().await.unwrap();
    let ranks = |v: &[Member]| v.iter().map(|m| (m.id, m.rank)).collect::<Vec<_>>();
    assert_eq!(ranks(&before), ranks(&after));
}

#[tokio::test]
async fn moves_to_and_from_unranked_keep_density() {
    let store = MemoryMemberStore::new();
    let svc = service(&store);
    let a = svc.create(create_input("A", Some(1))).await.unwrap();
    svc.create(create_input("B", Some(2))).await.unwrap();
    svc.create(create_input("C", Some(3))).await.unwrap();
    let d = svc.create(create_input("D", None)).await.unwrap();
    let e = svc.create(create_input("E", None)).await.unwrap();

    svc.update(a, rank_input(0)).await.unwrap();
    let ranks = ranks_by_name(&svc).await;
    assert_eq!((ranks["A"], ranks["B"], ranks["C"]), (0, 1, 2));
    assert_eq!((ranks["D"], ranks["E"]), (0, 0));

    svc.update(d, rank_input(1)).await.unwrap();
    let ranks = ranks_by_name(&svc).await;
    assert_eq!((ranks["D"], ranks["B"], ranks["C"]), (1, 2, 3));
    assert_eq!((ranks["A"], ranks["E"]), (0, 0));

    svc.delete(e).await.unwrap();
    assert_dense(&svc.list().await.unwrap());
}

#[tokio::test]
async fn partial_update_keeps_other_fields() {
    let store = MemoryMemberStore::new();
    let svc = service(&store);
    let body = json!({
        "poste": "Président", "nom": "Awa", "fonction": "Direction",
        "photo": "https://cdn.example.org/awa.jpg", "ordre": 1
    });
    let id = svc.create(MemberInput::from_json(body).unwrap()).await.unwrap();

    let updated = svc
        .update(id, MemberInput::from_json(json!({ "photo_path": "/uploads/1-awa.png" })).unwrap())
        .await
        .unwrap();
    assert_eq!(updated.nom, "Awa");
    assert_eq!(updated.rank, 1);
    assert_eq!(updated.photo.as_deref(), Some("/uploads/1-awa.png"));

    let err = svc
        .update(id, MemberInput::from_json(json!({ "nom": "Solo" })).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(svc.get(id).await.unwrap().nom, "Awa");
}

#[tokio::test]
async fn missing_rows_are_not_found() {
    let store = MemoryMemberStore::new();
    let svc = service(&store);
    assert!(matches!(svc.get(42).await, Err(AppError::NotFound(_))));
    assert!(matches!(svc.update(42, rank_input(1)).await, Err(AppError::NotFound(_))));
    assert!(matches!(svc.delete(42).await, Err(AppError::NotFound(_))));
    let err = svc.create(MemberInput::from_json(json!({ "nom": "x" })).unwrap()).await;
    assert!(matches!(err, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn failed_final_write_rolls_back_every_shift() {
    let store = MemoryMemberStore::new();
    let svc = service(&store);
    svc.create(create_input("A", Some(1))).await.unwrap();
    let b = svc.create(create_input("B", Some(2))).await.unwrap();
    let c = svc.create(create_input("C", Some(3))).await.unwrap();
    let snapshot = ranks_by_name(&svc).await;

    store.fail_next(FailPoint::InsertRow);
    assert!(svc.create(create_input("X", Some(1))).await.is_err());
    assert_eq!(ranks_by_name(&svc).await, snapshot);

    store.fail_next(FailPoint::UpdateRow);
    assert!(svc.update(c, rank_input(1)).await.is_err());
    assert_eq!(ranks_by_name(&svc).await, snapshot);

    store.fail_next(FailPoint::DeleteRow);
    assert!(svc.delete(b).await.is_err());
    assert_eq!(ranks_by_name(&svc).await, snapshot);

    // the store is still usable afterwards
    svc.delete(b).await.unwrap();
    assert_dense(&svc.list().await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_at_same_rank_serialize() {
    let store = MemoryMemberStore::new();
    let svc = service(&store);
    svc.create(create_input("U", None)).await.unwrap();

    let first = tokio::spawn({
        let svc = svc.clone();
        async move { svc.create(create_input("P", Some(1))).await }
    });
    let second = tokio::spawn({
        let svc = svc.clone();
        async move { svc.create(create_input("Q", Some(1))).await }
    });
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    let ranks = ranks_by_name(&svc).await;
    let mut pq = vec![ranks["P"], ranks["Q"]];
    pq.sort_unstable();
    assert_eq!(pq, vec![1, 2]);
    assert_eq!(ranks["U"], 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn blocked_writer_sees_committed_shift() {
    let store = MemoryMemberStore::new();
    let svc = service(&store);
    let a = svc.create(create_input("A", Some(1))).await.unwrap();

    let mut holder = store.begin().await.unwrap();
    holder.lock_range(RankRange::at_least(1)).await.unwrap();

    let waiter = tokio::spawn({
        let svc = svc.clone();
        async move { svc.create(create_input("W", Some(1))).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished());

    // reads are not blocked by the held range lock
    assert_eq!(svc.get(a).await.unwrap().rank, 1);

    holder.shift(RankRange::at_least(1), 1).await.unwrap();
    holder
        .insert_row(&MemberRow {
            poste: "Bureau".into(),
            nom: "H".into(),
            fonction: "Membre".into(),
            photo: None,
            rank: 1,
        })
        .await
        .unwrap();
    holder.commit().await.unwrap();

    waiter.await.unwrap().unwrap();
    let ranks = ranks_by_name(&svc).await;
    assert_eq!((ranks["W"], ranks["H"], ranks["A"]), (1, 2, 3));
}

#[tokio::test]
async fn lock_wait_is_bounded() {
    let store = MemoryMemberStore::with_lock_timeout(Duration::from_millis(30));
    let svc = service(&store);
    let mut holder = store.begin().await.unwrap();
    holder.lock_range(RankRange::at_least(1)).await.unwrap();

    let err = svc.create(create_input("W", Some(1))).await.unwrap_err();
    assert!(err.is_retryable());
    drop(holder);
    svc.create(create_input("W", Some(1))).await.unwrap();
}

#[tokio::test]
async fn random_operation_sequences_stay_dense() {
    for seed in 0..20u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let store = MemoryMemberStore::new();
        let svc = service(&store);
        let mut ids: Vec<MemberId> = Vec::new();

        for step in 0..60 {
            let n = ids.len() as i64;
            match rng.gen_range(0..3) {
                0 => {
                    let ordre = rng.gen_range(-1..=n + 2);
                    let id = svc.create(create_input(&format!("m{}", step), Some(ordre))).await.unwrap();
                    ids.push(id);
                }
                1 if !ids.is_empty() => {
                    let id = ids[rng.gen_range(0..ids.len())];
                    let ordre = rng.gen_range(0..=n + 2);
                    svc.update(id, rank_input(ordre)).await.unwrap();
                }
                2 if !ids.is_empty() => {
                    let id = ids.swap_remove(rng.gen_range(0..ids.len()));
                    svc.delete(id).await.unwrap();
                }
                _ => {}
            }
            let all = svc.list().await.unwrap();
            assert_eq!(all.len(), ids.len());
            assert_dense(&all);
        }
    }
}
