//! Integration tests for Book Finder
//!
//! These drive the results list end to end: a real `InfiniteQuery` over a
//! scripted or HTTP-mocked source, the in-process viewport and the shared
//! write store.

use book_finder::models::{BookRecord, ResultPage};
use book_finder::query::{InfiniteQuery, QueryFetcher};
use book_finder::sources::mock::{make_book, paginate};
use book_finder::sources::{BookSource, MockSource, OpenLibrarySource, SourceError};
use book_finder::store::{FormStore, WriteField, WriteStore};
use book_finder::utils::HttpClient;
use book_finder::view::{ListState, ResultsView, SearchResultsList, SearchResultsProps};
use book_finder::viewport::{SentinelId, VisibilityTracker};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn books(prefix: &str, count: usize) -> Vec<BookRecord> {
    (1..=count)
        .map(|i| make_book(&format!("{}-{}", prefix, i), &format!("{} {}", prefix, i)))
        .collect()
}

struct Harness {
    list: SearchResultsList<InfiniteQuery>,
    store: WriteStore,
    tracker: VisibilityTracker,
    selected: Arc<Mutex<Vec<BookRecord>>>,
    closes: Arc<AtomicUsize>,
}

fn mount(source: Arc<dyn BookSource>, query: &str, page_size: usize) -> Harness {
    let store = WriteStore::new();
    let tracker = VisibilityTracker::new();
    let selected = Arc::new(Mutex::new(Vec::new()));
    let closes = Arc::new(AtomicUsize::new(0));

    let sink = Arc::clone(&selected);
    let close_count = Arc::clone(&closes);
    let props = SearchResultsProps::new(query)
        .on_change(move |book| sink.lock().unwrap().push(book))
        .handle_close(move || {
            close_count.fetch_add(1, Ordering::SeqCst);
        });

    let list = SearchResultsList::mount(
        props,
        InfiniteQuery::new(source).page_size(page_size),
        Arc::new(store.clone()),
        Arc::new(tracker.clone()),
    );

    Harness {
        list,
        store,
        tracker,
        selected,
        closes,
    }
}

/// Render and return the sentinel id, if one is mounted
trait RenderSentinel {
    fn render_sentinel(&mut self) -> Option<SentinelId>;
}

impl RenderSentinel for SearchResultsList<InfiniteQuery> {
    fn render_sentinel(&mut self) -> Option<SentinelId> {
        match self.render() {
            ResultsView::List(view) => view.sentinel,
            ResultsView::Empty(_) => None,
        }
    }
}

fn titles(list: &mut SearchResultsList<InfiniteQuery>) -> Vec<String> {
    match list.render() {
        ResultsView::List(view) => view.items.iter().map(|b| b.title.clone()).collect(),
        ResultsView::Empty(_) => Vec::new(),
    }
}

#[tokio::test]
async fn test_scrolling_loads_every_page_in_order() {
    let source = Arc::new(MockSource::new());
    source.set_pages("dune", paginate(books("dune", 5), 2));
    let mut h = mount(source.clone(), "dune", 2);

    // Loading: the list shows, empty, with no fallback flash
    assert_eq!(h.list.state(), ListState::LoadingOrHasResults);
    h.list.wait_for_update().await;

    for _ in 0..5 {
        let Some(sentinel) = h.list.render_sentinel() else {
            break;
        };
        assert!(h.tracker.is_observed(sentinel));
        assert!(h.list.on_sentinel_visible(sentinel));
        h.list.wait_for_update().await;
    }

    assert_eq!(
        titles(&mut h.list),
        vec!["dune 1", "dune 2", "dune 3", "dune 4", "dune 5"]
    );
    assert_eq!(h.list.sentinel(), None);
    assert_eq!(h.tracker.observer_count(), 0);
    assert_eq!(source.call_count(), 3);
}

#[tokio::test]
async fn test_sentinel_seen_twice_during_a_fetch_requests_one_page() {
    let source = Arc::new(MockSource::new().with_delay(Duration::from_millis(40)));
    source.set_pages("dune", paginate(books("dune", 6), 2));
    let mut h = mount(source.clone(), "dune", 2);
    h.list.wait_for_update().await;

    let sentinel = h.list.render_sentinel().expect("sentinel");
    assert!(h.list.on_sentinel_visible(sentinel));
    assert!(!h.list.on_sentinel_visible(sentinel));

    // Still loading, the fired sentinel is not replaced yet
    assert_eq!(h.list.render_sentinel(), Some(sentinel));
    h.list.wait_for_update().await;

    let next = h.list.render_sentinel().expect("sentinel");
    assert_ne!(next, sentinel);
    assert_eq!(titles(&mut h.list).len(), 4);
    assert_eq!(source.call_count(), 2);
}

#[tokio::test]
async fn test_no_matches_falls_back_to_manual_entry() {
    let source = Arc::new(MockSource::new());
    let mut h = mount(source, "Dune", 10);
    h.list.wait_for_update().await;

    assert_eq!(h.list.state(), ListState::EmptyAfterLoad);
    assert!(h.list.render().is_empty_state());
    assert!(h.list.select(0).is_err());

    h.list.enter_title_manually().unwrap();
    assert_eq!(h.store.get(WriteField::Title), "Dune");
    assert_eq!(h.closes.load(Ordering::SeqCst), 1);
    assert!(h.selected.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_search_looks_like_no_matches() {
    let source = Arc::new(MockSource::new());
    source.fail_page("dune", 1, SourceError::Network("connection refused".to_string()));
    let mut h = mount(source, "dune", 10);
    h.list.wait_for_update().await;

    assert!(h.list.render().is_empty_state());
    assert!(matches!(
        h.list.fetcher().last_error(),
        Some(SourceError::Network(_))
    ));
}

#[tokio::test]
async fn test_blank_query_is_rejected_by_the_source() {
    let source = Arc::new(OpenLibrarySource::new(Arc::new(HttpClient::new().unwrap())));
    let mut h = mount(source, "   ", 10);
    h.list.wait_for_update().await;

    assert_eq!(h.list.state(), ListState::EmptyAfterLoad);
    assert!(matches!(
        h.list.fetcher().last_error(),
        Some(SourceError::InvalidRequest(_))
    ));
}

#[tokio::test]
async fn test_select_hands_over_the_third_of_five() {
    let source = Arc::new(MockSource::new());
    let five = books("emma", 5);
    source.set_pages("emma", paginate(five.clone(), 5));
    let mut h = mount(source, "emma", 5);
    h.list.wait_for_update().await;

    h.list.select(2).unwrap();

    assert_eq!(*h.selected.lock().unwrap(), vec![five[2].clone()]);
    assert_eq!(h.closes.load(Ordering::SeqCst), 0);
    assert_eq!(h.store.title(), "");
}

#[tokio::test]
async fn test_query_change_never_mixes_sessions() {
    let source = Arc::new(MockSource::new().with_delay(Duration::from_millis(20)));
    source.set_pages("dun", paginate(books("dun", 4), 2));
    source.set_pages("dune", paginate(books("dune", 1), 2));
    let mut h = mount(source, "dun", 2);

    // Change the query while page 1 of "dun" is still in flight
    h.list.set_query("dune");
    tokio::time::sleep(Duration::from_millis(60)).await;
    h.list.wait_for_update().await;
    h.list.sync();

    assert_eq!(titles(&mut h.list), vec!["dune 1"]);
    assert_eq!(h.list.render_sentinel(), None);
}

#[tokio::test]
async fn test_drop_releases_the_observer() {
    let source = Arc::new(MockSource::new());
    source.set_pages("dune", paginate(books("dune", 4), 2));
    let mut h = mount(source, "dune", 2);
    h.list.wait_for_update().await;
    assert!(h.list.render_sentinel().is_some());
    assert_eq!(h.tracker.observer_count(), 1);

    let tracker = h.tracker.clone();
    drop(h);
    assert_eq!(tracker.observer_count(), 0);
}

#[tokio::test]
async fn test_open_library_pages_through_the_list() {
    let mut server = mockito::Server::new_async().await;
    let first = server
        .mock("GET", "/search.json")
        .match_query(mockito::Matcher::UrlEncoded("page".into(), "1".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"numFound": 3, "start": 0, "docs": [
                {"key": "/works/OL1W", "title": "Dune", "author_name": ["Frank Herbert"]},
                {"key": "/works/OL2W", "title": "Dune Messiah", "author_name": ["Frank Herbert"]}
            ]}"#,
        )
        .create_async()
        .await;
    let second = server
        .mock("GET", "/search.json")
        .match_query(mockito::Matcher::UrlEncoded("page".into(), "2".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"numFound": 3, "start": 2, "docs": [
                {"key": "/works/OL3W", "title": "Children of Dune"}
            ]}"#,
        )
        .create_async()
        .await;

    let client = Arc::new(HttpClient::new().unwrap());
    let source = Arc::new(OpenLibrarySource::with_base_url(client, server.url()));
    let mut h = mount(source, "dune", 2);
    h.list.wait_for_update().await;

    let sentinel = h.list.render_sentinel().expect("more pages");
    h.list.on_sentinel_visible(sentinel);
    h.list.wait_for_update().await;

    first.assert_async().await;
    second.assert_async().await;
    assert_eq!(
        titles(&mut h.list),
        vec!["Dune", "Dune Messiah", "Children of Dune"]
    );
    assert_eq!(h.list.render_sentinel(), None);
}

#[test]
fn test_result_page_continuation() {
    let page = ResultPage::new(3, books("x", 2)).is_last(false);
    assert_eq!(page.next_page(), Some(4));
    assert_eq!(page.is_last(true).next_page(), None);
}
