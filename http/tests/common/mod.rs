//! Canned HTTP origin for backend tests.
#![allow(dead_code)] // Not every test binary uses every helper.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use keelfs_http::{HttpClient, HttpError};

#[derive(Debug)]
pub struct MockClient {
    bodies: HashMap<String, Vec<u8>>,
    gets: Mutex<Vec<String>>,
    heads: Mutex<Vec<String>>,
}

impl MockClient {
    pub fn new(entries: &[(&str, &[u8])]) -> Arc<Self> {
        Arc::new(Self {
            bodies: entries
                .iter()
                .map(|(url, body)| ((*url).to_owned(), body.to_vec()))
                .collect(),
            gets: Mutex::new(Vec::new()),
            heads: Mutex::new(Vec::new()),
        })
    }

    pub fn get_count(&self, url: &str) -> usize {
        self.gets.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    pub fn head_count(&self, url: &str) -> usize {
        self.heads.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

impl HttpClient for MockClient {
    fn get(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        self.gets.lock().unwrap().push(url.to_owned());
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| HttpError::Status {
                status: 404,
                url: url.to_owned(),
            })
    }

    fn head(&self, url: &str) -> Result<u64, HttpError> {
        self.heads.lock().unwrap().push(url.to_owned());
        self.bodies
            .get(url)
            .map(|body| body.len() as u64)
            .ok_or_else(|| HttpError::Status {
                status: 404,
                url: url.to_owned(),
            })
    }
}
