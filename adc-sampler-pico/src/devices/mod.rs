pub mod ads1015;
