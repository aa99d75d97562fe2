//! Drives the detector with an observer that only fires when told to, so the
//! tests control exactly when notifications arrive.

use children_loaded::{
    ChildListObserver, DetectorConfig, LoadDetector, LoadError, MutationCallback, MutationSummary,
    ObserveOptions, Subscription,
};
use children_loaded_dom::{Document, Node};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

struct Slot {
    target: Node,
    options: ObserveOptions,
    callback: Option<MutationCallback>,
    disconnects: Rc<Cell<usize>>,
}

#[derive(Clone, Default)]
struct FakeObserver {
    slots: Rc<RefCell<Vec<Slot>>>,
    refuse: Rc<Cell<bool>>,
}

impl FakeObserver {
    /// Invokes every connected callback registered on `target`.
    fn fire(&self, target: &Node) -> usize {
        let callbacks: Vec<(usize, MutationCallback)> = self
            .slots
            .borrow_mut()
            .iter_mut()
            .enumerate()
            .filter(|(_, slot)| slot.target.ptr_eq(target))
            .filter_map(|(index, slot)| slot.callback.take().map(|cb| (index, cb)))
            .collect();

        let fired = callbacks.len();
        for (index, mut callback) in callbacks {
            callback(&MutationSummary {
                records: 1,
                added: 1,
                removed: 0,
            });
            let mut slots = self.slots.borrow_mut();
            let slot = &mut slots[index];
            // Only hand the callback back if it was not disconnected meanwhile.
            if slot.disconnects.get() == 0 {
                slot.callback = Some(callback);
            }
        }
        fired
    }

    fn connected(&self) -> usize {
        self.slots
            .borrow()
            .iter()
            .filter(|slot| slot.disconnects.get() == 0)
            .count()
    }

    fn disconnect_counts(&self) -> Vec<usize> {
        self.slots
            .borrow()
            .iter()
            .map(|slot| slot.disconnects.get())
            .collect()
    }

    fn options(&self) -> Vec<ObserveOptions> {
        self.slots.borrow().iter().map(|slot| slot.options).collect()
    }
}

struct FakeSubscription {
    disconnects: Rc<Cell<usize>>,
    slots: Rc<RefCell<Vec<Slot>>>,
    index: usize,
    connected: bool,
}

impl Subscription for FakeSubscription {
    fn disconnect(&mut self) {
        if !self.connected {
            return;
        }
        self.connected = false;
        self.disconnects.set(self.disconnects.get() + 1);
        if let Ok(mut slots) = self.slots.try_borrow_mut() {
            slots[self.index].callback = None;
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

impl Drop for FakeSubscription {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl ChildListObserver<Node> for FakeObserver {
    fn observe(
        &self,
        target: &Node,
        options: ObserveOptions,
        callback: MutationCallback,
    ) -> Result<Box<dyn Subscription>, LoadError> {
        if self.refuse.get() {
            return Err(LoadError::Observe("observer refused".to_string()));
        }
        let disconnects = Rc::new(Cell::new(0));
        let mut slots = self.slots.borrow_mut();
        slots.push(Slot {
            target: target.clone(),
            options,
            callback: Some(callback),
            disconnects: Rc::clone(&disconnects),
        });
        Ok(Box::new(FakeSubscription {
            disconnects,
            slots: Rc::clone(&self.slots),
            index: slots.len() - 1,
            connected: true,
        }))
    }
}

fn unfinished_page() -> (Document, Node, Node) {
    let doc = Document::new();
    let html = doc.create_element("html");
    doc.root().append_child(&html).unwrap();
    let div = doc.create_element("div");
    html.append_child(&div).unwrap();
    (doc, html, div)
}

#[test]
fn notifications_rerun_the_heuristic() {
    let (doc, html, div) = unfinished_page();
    let observer = FakeObserver::default();
    let detector = LoadDetector::new(observer.clone());
    let check = detector.is_loaded(&div, false).unwrap().into_pending().unwrap();

    assert_eq!(observer.fire(&div), 1);
    assert!(!check.is_resolved());

    html.append_child(&doc.create_element("footer")).unwrap();
    assert!(!check.is_resolved());
    assert_eq!(observer.fire(&div), 1);

    assert!(check.is_resolved());
    assert_eq!(observer.disconnect_counts(), vec![1]);
    assert_eq!(observer.fire(&div), 0);
}

#[test]
fn superseded_subscription_is_disconnected_once() {
    let (doc, html, div) = unfinished_page();
    let observer = FakeObserver::default();
    let detector = LoadDetector::new(observer.clone());

    let old = detector.is_loaded(&div, false).unwrap().into_pending().unwrap();
    let new = detector.is_loaded(&div, true).unwrap().into_pending().unwrap();
    assert_eq!(observer.disconnect_counts(), vec![1, 0]);
    assert_eq!(observer.connected(), 1);

    html.append_child(&doc.create_element("footer")).unwrap();
    assert_eq!(observer.fire(&div), 1);

    assert!(new.is_resolved());
    assert!(old.is_abandoned());
    assert_eq!(observer.disconnect_counts(), vec![1, 1]);
    assert_eq!(observer.connected(), 0);
}

#[test]
fn shared_check_creates_one_subscription() {
    let (_doc, _html, div) = unfinished_page();
    let observer = FakeObserver::default();
    let detector = LoadDetector::new(observer.clone());

    for _ in 0..5 {
        detector.is_loaded(&div, false).unwrap();
    }

    assert_eq!(observer.connected(), 1);
    assert_eq!(observer.options(), vec![ObserveOptions::child_list()]);
}

#[test]
fn refused_observation_is_reported_and_not_registered() {
    let (_doc, _html, div) = unfinished_page();
    let observer = FakeObserver::default();
    observer.refuse.set(true);
    let detector = LoadDetector::new(observer.clone());

    let result = detector.is_loaded(&div, false);

    assert!(matches!(result, Err(LoadError::Observe(_))));
    assert!(detector.pending(&div).is_none());
}

#[test]
fn deep_config_observes_the_subtree() {
    let (_doc, _html, div) = unfinished_page();
    let observer = FakeObserver::default();
    let detector = LoadDetector::with_config(observer.clone(), DetectorConfig::deep());

    detector.is_loaded(&div, false).unwrap();

    assert_eq!(
        observer.options(),
        vec![ObserveOptions::child_list().with_subtree()]
    );
}
