//! Filtering and sorting applied to hook snapshots by the public pages.
//!
//! Filter structs deserialize straight from query strings. An absent filter
//! means "all".

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::models::{
    AlbumStatus, Event, EventStatus, Faculty, GalleryAlbum, GalleryPhoto, StudyMaterial,
};

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Faculty ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacultySort {
    #[default]
    Name,
    Designation,
}

/// Faculty search parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FacultyFilter {
    /// Matched case-insensitively against name, designation and specializations.
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub specialization: Option<String>,
    #[serde(default)]
    pub sort: FacultySort,
}

pub fn filter_faculty(faculty: &[Faculty], filter: &FacultyFilter) -> Vec<Faculty> {
    let needle = filter.q.as_deref().unwrap_or("").to_lowercase();
    let mut matches: Vec<Faculty> = faculty
        .iter()
        .filter(|f| {
            needle.is_empty()
                || contains_ci(&f.name, &needle)
                || contains_ci(&f.designation, &needle)
                || f.specialization.iter().any(|s| contains_ci(s, &needle))
        })
        .filter(|f| {
            filter
                .specialization
                .as_ref()
                .map_or(true, |wanted| f.specialization.contains(wanted))
        })
        .cloned()
        .collect();

    match filter.sort {
        FacultySort::Name => matches.sort_by(|a, b| a.name.cmp(&b.name)),
        FacultySort::Designation => matches.sort_by(|a, b| a.designation.cmp(&b.designation)),
    }
    matches
}

/// Distinct specializations across all faculty, sorted.
pub fn specializations(faculty: &[Faculty]) -> Vec<String> {
    faculty
        .iter()
        .flat_map(|f| f.specialization.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MaterialFilter {
    /// Matched case-insensitively against title and subject.
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub course: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub semester: Option<String>,
}

pub fn filter_materials(materials: &[StudyMaterial], filter: &MaterialFilter) -> Vec<StudyMaterial> {
    let needle = filter.q.as_deref().unwrap_or("").to_lowercase();
    materials
        .iter()
        .filter(|m| {
            needle.is_empty() || contains_ci(&m.title, &needle) || contains_ci(&m.subject, &needle)
        })
        .filter(|m| filter.course.as_ref().map_or(true, |c| &m.course == c))
        .filter(|m| filter.kind.as_ref().map_or(true, |k| &m.kind == k))
        .filter(|m| {
            filter
                .semester
                .as_ref()
                .map_or(true, |s| m.semester.as_ref() == Some(s))
        })
        .cloned()
        .collect()
}

/// Distinct non-empty semesters, sorted.
pub fn semesters(materials: &[StudyMaterial]) -> Vec<String> {
    materials
        .iter()
        .filter_map(|m| m.semester.clone())
        .filter(|s| !s.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn upcoming_events(events: &[Event]) -> Vec<Event> {
    events
        .iter()
        .filter(|e| e.status == EventStatus::Upcoming)
        .cloned()
        .collect()
}

pub fn featured_events(events: &[Event]) -> Vec<Event> {
    events.iter().filter(|e| e.is_featured).cloned().collect()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFilter {
    /// Matched case-insensitively against title, description and venue.
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

pub fn filter_events(events: &[Event], filter: &EventFilter) -> Vec<Event> {
    let needle = filter.q.as_deref().unwrap_or("").to_lowercase();
    events
        .iter()
        .filter(|e| {
            needle.is_empty()
                || contains_ci(&e.title, &needle)
                || contains_ci(&e.description, &needle)
                || contains_ci(&e.venue, &needle)
        })
        .filter(|e| filter.category.as_ref().map_or(true, |c| &e.category == c))
        .cloned()
        .collect()
}

pub fn event_categories(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .map(|e| e.category.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn published_albums(albums: &[GalleryAlbum]) -> Vec<GalleryAlbum> {
    albums
        .iter()
        .filter(|a| a.status == AlbumStatus::Published)
        .cloned()
        .collect()
}

/// Photos whose album is published, optionally only albums of `category`.
pub fn published_photos(
    albums: &[GalleryAlbum],
    photos: &[GalleryPhoto],
    category: Option<&str>,
) -> Vec<GalleryPhoto> {
    photos
        .iter()
        .filter(|photo| {
            albums
                .iter()
                .find(|album| album.id == photo.album_id)
                .is_some_and(|album| {
                    album.status == AlbumStatus::Published
                        && category.map_or(true, |c| album.category == c)
                })
        })
        .cloned()
        .collect()
}
