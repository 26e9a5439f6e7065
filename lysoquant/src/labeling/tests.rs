use common::Buffer2;

use super::*;
use crate::geometry::{Rect, Roi, Shape};

/// Builds a label plane from rows of digits, `.` for background.
fn plane(rows: &[&str]) -> Buffer2<u16> {
    let height = rows.len();
    let width = rows[0].len();
    Buffer2::from_fn(width, height, |x, y| match rows[y].as_bytes()[x] {
        b'.' => 0,
        digit => (digit - b'0') as u16,
    })
}

fn boxes(objects: &[LabeledObject]) -> Vec<Rect> {
    objects.iter().map(|o| o.footprint.int_bounds()).collect()
}

#[test]
fn objects_come_out_in_raster_order_with_ordinals() {
    let labels = plane(&[
        "....22", //
        "11..22", //
        "11....", //
        "...2..",
    ]);

    let objects = extract_plane_objects(&labels, 2, None, 0.0, Connectivity::Eight);

    assert_eq!(objects.len(), 2);
    assert_eq!(boxes(&objects), vec![Rect::new(4, 0, 2, 2), Rect::new(3, 3, 1, 1)]);
    assert_eq!(objects[0].ordinal, 1);
    assert_eq!(objects[1].ordinal, 2);
    assert!(objects.iter().all(|o| o.class_id == 2));
}

#[test]
fn diagonal_pixels_join_only_with_eight_connectivity() {
    let labels = plane(&[
        "1..", //
        ".1.", //
        "..1",
    ]);

    assert_eq!(
        extract_plane_objects(&labels, 1, None, 0.0, Connectivity::Eight).len(),
        1
    );
    assert_eq!(
        extract_plane_objects(&labels, 1, None, 0.0, Connectivity::Four).len(),
        3
    );
}

#[test]
fn branches_meeting_below_are_one_object() {
    let labels = plane(&[
        "1.1.1", //
        "1.1.1", //
        "11111",
    ]);

    let objects = extract_plane_objects(&labels, 1, None, 0.0, Connectivity::Four);

    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].pixel_count, 11);
    assert_eq!(objects[0].footprint.int_bounds(), Rect::new(0, 0, 5, 3));
}

#[test]
fn enclosed_background_belongs_to_footprint() {
    let labels = plane(&[
        ".....", //
        ".111.", //
        ".1.1.", //
        ".111.", //
        ".....",
    ]);

    let objects = extract_plane_objects(&labels, 1, None, 0.0, Connectivity::Eight);

    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].pixel_count, 8);
    assert_eq!(objects[0].footprint.area(), 9.0);
    assert!(objects[0].footprint.rasterize(5, 5).contains(2, 2));
}

#[test]
fn open_notch_is_not_filled() {
    let labels = plane(&[
        "111", //
        "1.1", //
        "1.1",
    ]);

    let objects = extract_plane_objects(&labels, 1, None, 0.0, Connectivity::Eight);

    assert_eq!(objects[0].footprint.area(), 7.0);
}

#[test]
fn small_objects_are_dropped_before_numbering() {
    let labels = plane(&[
        "1...", //
        "..11", //
        "..1.",
    ]);

    let objects = extract_plane_objects(&labels, 1, None, 2.0, Connectivity::Eight);

    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].ordinal, 1);
    assert_eq!(objects[0].pixel_count, 3);
}

#[test]
fn region_restricts_search() {
    let labels = plane(&[
        "11..11", //
        "11..11",
    ]);
    let region = Roi::rect("right", 3.0, 0.0, 3.0, 2.0).rasterize(6, 2);

    let objects = extract_plane_objects(&labels, 1, Some(&region), 0.0, Connectivity::Eight);

    assert_eq!(boxes(&objects), vec![Rect::new(4, 0, 2, 2)]);
}

#[test]
fn absent_class_yields_no_objects() {
    let labels = plane(&["11", "11"]);
    assert!(extract_plane_objects(&labels, 2, None, 0.0, Connectivity::Eight).is_empty());
}

#[test]
fn label_image_planes_are_addressed_by_slice_and_frame() {
    let planes = vec![plane(&["1.", ".."]), plane(&["..", ".2"])];
    let labels = LabelImage::from_planes("LQ_test", 1, 2, planes).unwrap();

    assert_eq!(extract_objects(&labels, 2, None, 0.0, 1, 1).len(), 0);
    let objects = extract_objects(&labels, 2, None, 0.0, 1, 2);
    assert_eq!(boxes(&objects), vec![Rect::new(1, 1, 1, 1)]);
}
