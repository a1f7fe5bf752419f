use std::sync::Arc;
use std::time::Duration;

use jalali_localizer::{
    AllowList, Document, DocumentTree, FixedClock, GregorianDate, LifecycleController,
    LocalizerConfig, SettingsStore, SharedDocument,
};
use parking_lot::Mutex;

fn page() -> SharedDocument<Document> {
    let mut doc = Document::new();
    let root = doc.root();
    let article = doc.append_element(root, "article").unwrap();
    doc.append_text(article, "Posted 2024-03-20, updated 20/04/2025.").unwrap();
    let footer = doc.append_element(root, "footer").unwrap();
    doc.append_text(footer, "Copyright 2024").unwrap();
    let script = doc.append_element(root, "script").unwrap();
    doc.append_text(script, "window.built = '2024-03-20';").unwrap();
    Arc::new(Mutex::new(doc))
}

fn text_of(document: &SharedDocument<Document>) -> String {
    let doc = document.lock();
    doc.text_content(doc.root())
}

#[tokio::test(start_paused = true)]
async fn localizes_page_and_follows_dynamic_content() {
    let document = page();
    let store = Arc::new(SettingsStore::default());
    let root = document.lock().root();

    let mut controller = LifecycleController::new(
        Arc::clone(&document),
        root,
        "https://blog.example.com/posts/1",
        Arc::clone(&store),
        AllowList::new(["*.example.com"]),
    )
    .with_counter(store.clone())
    .with_clock(Arc::new(FixedClock(GregorianDate::new(2024, 3, 21).unwrap())))
    .with_config(LocalizerConfig {
        debounce_ms: 50,
        ..LocalizerConfig::default()
    });

    assert!(controller.activate().await);
    assert_eq!(
        text_of(&document),
        "Posted 1403/01/01, updated 1404/01/31.Copyright 2024window.built = '2024-03-20';"
    );
    assert_eq!(store.converted_count(), 2);

    let handle = controller.session().unwrap().handle();
    let task = tokio::spawn(async move {
        controller.run().await;
        controller
    });

    {
        let mut doc = document.lock();
        let root = doc.root();
        doc.batch(|doc| {
            let comment = doc.append_element(root, "div").unwrap();
            doc.append_text(comment, "Reply from yesterday").unwrap();
            doc.append_text(comment, " and March 5, 2024").unwrap();
        });
    }
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(text_of(&document).ends_with("Reply from 1403/01/01 and 1402/12/15"));
    assert_eq!(store.converted_count(), 4);

    let script_text = {
        let mut doc = document.lock();
        let root = doc.root();
        let script = doc.children(root)[2];
        assert_eq!(doc.tag(script), Some("script"));
        doc.append_text(script, "window.patched = '2024-03-20';").unwrap()
    };
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        document.lock().text(script_text),
        Some("window.patched = '2024-03-20';")
    );
    assert_eq!(store.converted_count(), 4);

    handle.destroy();
    tokio::time::sleep(Duration::from_millis(10)).await;
    {
        let mut doc = document.lock();
        let root = doc.root();
        doc.append_text(root, " | Late 2024-12-25").unwrap();
    }
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(text_of(&document).ends_with(" | Late 2024-12-25"));
    assert_eq!(store.converted_count(), 4);
    assert!(handle.is_destroyed());

    task.abort();
}

#[tokio::test(start_paused = true)]
async fn disallowed_origin_is_left_alone() {
    let document = page();
    let store = Arc::new(SettingsStore::default());
    store.set_allowed_domains(["news.example.ir"]);
    let root = document.lock().root();

    let mut controller = LifecycleController::new(
        Arc::clone(&document),
        root,
        "https://blog.example.com",
        Arc::clone(&store),
        Arc::clone(&store),
    );

    assert!(!controller.activate().await);
    assert!(text_of(&document).starts_with("Posted 2024-03-20"));
    assert_eq!(store.converted_count(), 0);
}
