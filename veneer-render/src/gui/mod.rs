pub mod draw_data;
