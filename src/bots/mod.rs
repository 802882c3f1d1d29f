pub mod subscriber_bot;
