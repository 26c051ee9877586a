mod sources;
mod support;
mod web;
