/// Expandable List Example
///
/// This example demonstrates:
/// - Projecting a dive log (stand-alone dives and trips) onto a flat list
/// - Expanding and collapsing a trip
/// - Following the current dive into its trip
/// - Consuming the flat change notifications

use livelist::{ExpandableProjection, FlatProjection, Group, SourcePosition, TreeModel, ViewChange};
use std::cell::RefCell;
use std::rc::Rc;

fn print_rows(view: &ExpandableProjection<livelist::GroupTree<String>>) {
    for row in 0..view.len() {
        let record = view.get_row(row).unwrap();
        let marker = if view.is_expanded_row(row) {
            "v"
        } else if view.is_top_level(row) {
            " "
        } else {
            "   -"
        };
        let current = if view.current_row() == Some(row) { " <" } else { "" };
        println!("   {:2}: {} {}{}", row, marker, record, current);
    }
}

fn print_changes(changes: &[ViewChange]) {
    for change in changes {
        println!("   {:?}", change);
    }
}

fn main() {
    env_logger::init();
    println!("=== LiveList Expandable Example ===\n");

    // 1. Build a small log, oldest first
    println!("1. Creating dive log...");
    let mut model = TreeModel::new(vec![
        Group::Leaf("Dive 1 - House reef".to_string()),
        Group::container(
            "Trip - Red Sea".to_string(),
            vec![
                "Dive 2 - Thistlegorm".to_string(),
                "Dive 3 - Ras Mohammed".to_string(),
                "Dive 4 - Abu Nuhas".to_string(),
            ],
        ),
        Group::Leaf("Dive 5 - Quarry".to_string()),
    ]);

    let view = Rc::new(RefCell::new(ExpandableProjection::new(model.tree())));
    model.subscribe(view.clone());
    println!("   Flat list, newest first ({} rows):", view.borrow().len());
    print_rows(&view.borrow());

    // 2. Open the trip
    println!("\n2. Expanding the trip...");
    view.borrow_mut().expand(1);
    print_changes(&view.borrow_mut().drain_changes());
    print_rows(&view.borrow());

    // 3. Log another dive on the trip
    println!("\n3. Adding a dive to the trip...");
    model
        .insert_items(1, 3, vec!["Dive 6 - Shark reef".to_string()])
        .unwrap();
    print_changes(&view.borrow_mut().drain_changes());
    print_rows(&view.borrow());

    // 4. Select a stand-alone dive, then collapse the trip, which drops the selection
    println!("\n4. Selecting the quarry dive and collapsing...");
    model.set_current(Some(SourcePosition::top_level(2))).unwrap();
    view.borrow_mut().unexpand();
    print_changes(&view.borrow_mut().drain_changes());
    print_rows(&view.borrow());

    // 5. Selecting a dive inside the trip opens it again
    println!("\n5. Selecting a dive inside the trip...");
    model.set_current(Some(SourcePosition::child(1, 0))).unwrap();
    print_changes(&view.borrow_mut().drain_changes());
    print_rows(&view.borrow());

    // 6. Move a dive out of the trip
    println!("\n6. Moving the newest trip dive to the top level...");
    model.move_rows(Some(1), 3, 3, None, 3).unwrap();
    print_changes(&view.borrow_mut().drain_changes());
    print_rows(&view.borrow());

    println!("\n=== Example Complete ===");
}
