pub mod strategy_interface;
