use children_loaded::{LoadDetector, LoadState, is_loaded_sync};
use children_loaded_dom::{Document, DomObserver, ParseReplay};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// Chunk size for the replay. A check only re-runs when the feed's own
// children change, so a chunk boundary right after the last article leaves it
// pending until the wait below gives up.
const CHUNK: usize = 4;

const PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head><title>Replay</title></head>
  <body>
    <section id="feed">
      <article>first</article>
      <article>second</article>
      <article>third</article>
    </section>
    <footer id="footer">end</footer>
  </body>
</html>"#;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .init();

    let doc = Document::new();
    let mut replay = ParseReplay::new(&doc, PAGE);
    let feed = match replay.step_until(|node| node.id() == Some("feed")) {
        Ok(Some(feed)) => feed,
        Ok(None) => {
            eprintln!("page has no #feed element");
            return;
        }
        Err(e) => {
            eprintln!("replay failed before #feed: {}", e);
            return;
        }
    };
    info!(loaded = is_loaded_sync(&feed), "feed inserted");

    let detector = LoadDetector::new(DomObserver);
    let state = match detector.is_loaded(&feed, false) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("cannot watch #feed: {}", e);
            return;
        }
    };
    if let LoadState::Pending(check) = &state {
        info!(check = check.id(), "waiting for feed children");
    }

    let waiter = async {
        match timeout(Duration::from_secs(2), state).await {
            Ok(loaded) => info!(loaded, "feed children loaded"),
            Err(_) => warn!(
                loaded = detector.is_loaded_sync(&feed),
                "no notification closed the feed, checked the tree instead"
            ),
        }
    };
    let parser = async {
        // Feed the page in small chunks, delivering mutations between reads.
        while !replay.is_done() {
            if let Err(e) = replay.advance(CHUNK) {
                eprintln!("replay failed: {}", e);
                return;
            }
            let delivered = replay.document().deliver_mutations();
            info!(remaining = replay.remaining(), delivered, "parsed chunk");
            tokio::task::yield_now().await;
        }
    };
    tokio::join!(waiter, parser);

    match replay.finish() {
        Ok(doc) => info!(ready_state = %doc.ready_state(), "document parsed"),
        Err(e) => eprintln!("cannot finish document: {}", e),
    }
}
