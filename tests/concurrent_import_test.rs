// ==========================================
// 并发确认导入测试
// ==========================================
// 测试目标: 两个连接同时全量替换时串行执行，结果为其中一批的完整内容
// ==========================================


use class_master::api::ImportApi;
use class_master::domain::ImportStatus;
use class_master::logging;
use std::thread;

fn confirm_reset_in_thread(db_path: String, ids: Vec<String>) -> thread::JoinHandle<ImportStatus> {
    thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().expect("Failed to create runtime");
        runtime.block_on(async move {
            // 每个线程独立连接，竞争同一数据库文件的写锁
            let api = ImportApi::new(&db_path).await.expect("Failed to create api");
            let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
            let sheet = test_helpers::simple_roster(&id_refs);
            api.confirm_roster(&sheet, Some(true))
                .await
                .expect("confirm failed")
                .result
                .status
        })
    })
}

#[test]
fn test_concurrent_full_resets_serialize() {
    logging::init_test();
    let (_temp_file, db_path) = test_helpers::create_test_db().expect("Failed to create test db");

    let batch_a: Vec<String> = (1..=50).map(|i| i.to_string()).collect();
    let batch_b: Vec<String> = (101..=120).map(|i| i.to_string()).collect();

    let handle_a = confirm_reset_in_thread(db_path.clone(), batch_a.clone());
    let handle_b = confirm_reset_in_thread(db_path.clone(), batch_b.clone());

    assert_eq!(handle_a.join().unwrap(), ImportStatus::Success);
    assert_eq!(handle_b.join().unwrap(), ImportStatus::Success);

    // 不会出现两批交错的结果
    let ids = test_helpers::student_ids(&db_path).unwrap();
    assert!(ids == batch_a || ids == batch_b, "unexpected ids: {:?}", ids);
}

#[tokio::test]
async fn test_sequential_confirms_on_shared_api() {
    logging::init_test();
    let (_temp_file, db_path) = test_helpers::create_test_db().expect("Failed to create test db");
    let api = ImportApi::new(&db_path).await.unwrap();

    for round in 0..5 {
        let ids: Vec<String> = (0..10).map(|i| (round * 10 + i).to_string()).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let result = api
            .confirm_roster(&test_helpers::simple_roster(&id_refs), Some(true))
            .await
            .unwrap();
        assert_eq!(result.result.inserted_count, 10);
    }

    assert_eq!(api.repository().count().unwrap(), 10);
}
